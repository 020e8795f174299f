use crate::config::Config;
use crate::model::Virus;
use crate::patient::Patient;
use crate::stats::StepTally;
use crate::types::{Record, Scenario};
use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Treatment schedule followed by every trial.
///
/// The prescription is added after `n_steps_pre` steps and stays active for
/// the remaining `n_steps_post` steps.
#[derive(Debug, Clone)]
pub struct Protocol {
    pub n_steps_pre: usize,
    pub n_steps_post: usize,
    pub prescription: Vec<String>,
    /// Drugs against which the resistant population is counted at every step.
    pub target_drugs: Vec<String>,
}

impl Protocol {
    /// Protocol without any treatment.
    pub fn untreated(n_steps: usize) -> Self {
        Self {
            n_steps_pre: n_steps,
            n_steps_post: 0,
            prescription: Vec::new(),
            target_drugs: Vec::new(),
        }
    }

    pub fn n_steps(&self) -> usize {
        self.n_steps_pre + self.n_steps_post
    }
}

/// Per-step tallies of the tracked populations.
pub struct Tally {
    pub total: StepTally,
    pub resistant: StepTally,
}

impl Tally {
    fn new(n_steps: usize) -> Self {
        Self {
            total: StepTally::new(n_steps),
            resistant: StepTally::new(n_steps),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            total: self.total.merge(other.total),
            resistant: self.resistant.merge(other.resistant),
        }
    }
}

/// Simulation engine.
///
/// Holds the configuration and the seed every trial stream is derived from,
/// and runs independent trials in parallel.
pub struct Engine {
    cfg: Config,
    seed: u64,
}

impl Engine {
    /// Create a new `Engine`, drawing a random seed if the configuration has none.
    pub fn new(cfg: Config) -> Result<Self> {
        let seed = match cfg.seed {
            Some(seed) => seed,
            None => ChaCha12Rng::try_from_os_rng()?.random(),
        };
        Ok(Self { cfg, seed })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Simulate simple viruses in an untreated patient.
    pub fn simulate_without_drug(&self) -> Record {
        let protocol = Protocol::untreated(self.cfg.trials.n_steps);
        let virus = self.cfg.simple_virus();
        log::info!(
            "seed virus: max_birth_prob = {}, clear_prob = {}",
            virus.max_birth_prob(),
            virus.clear_prob()
        );
        let tally = self.run_trials(&virus, &protocol);

        Record {
            scenario: Scenario::Simple,
            seed: self.seed,
            n_trials: tally.total.n_trials() as usize,
            treatment_step: None,
            total: tally.total.report(),
            resistant: None,
        }
    }

    /// Simulate resistant viruses in a patient treated halfway through.
    pub fn simulate_with_drug(&self) -> Record {
        let protocol = Protocol {
            n_steps_pre: self.cfg.trials.n_steps_pre,
            n_steps_post: self.cfg.trials.n_steps_post,
            prescription: self.cfg.patient.prescription.clone(),
            target_drugs: self.cfg.target_drugs().to_vec(),
        };
        let virus = self.cfg.resistant_virus();
        log::info!("seed virus resistances: {:?}", virus.resistances());
        let tally = self.run_trials(&virus, &protocol);

        Record {
            scenario: Scenario::Treated,
            seed: self.seed,
            n_trials: tally.total.n_trials() as usize,
            treatment_step: Some(protocol.n_steps_pre),
            total: tally.total.report(),
            resistant: Some(tally.resistant.report()),
        }
    }

    /// Run every trial of `protocol` starting from copies of `template`.
    pub fn run_trials<V: Virus + Sync>(&self, template: &V, protocol: &Protocol) -> Tally {
        let n_trials = self.cfg.trials.n_trials;
        let n_steps = protocol.n_steps();
        log::info!(
            "running {n_trials} trials of {n_steps} steps with seed {}",
            self.seed
        );

        let n_done = AtomicUsize::new(0);
        let log_every = (n_trials / 10).max(1);

        (0..n_trials)
            .into_par_iter()
            .fold(
                || Tally::new(n_steps),
                |mut tally, i_trial| {
                    self.run_trial(i_trial, template, protocol, &mut tally);

                    let done = n_done.fetch_add(1, Ordering::Relaxed) + 1;
                    if done % log_every == 0 || done == n_trials {
                        let progress = 100.0 * done as f64 / n_trials as f64;
                        log::info!("completed {progress:06.2}%");
                    }
                    tally
                },
            )
            .reduce(|| Tally::new(n_steps), Tally::merge)
    }

    fn run_trial<V: Virus>(
        &self,
        i_trial: usize,
        template: &V,
        protocol: &Protocol,
        tally: &mut Tally,
    ) {
        // Every trial draws from its own stream of the run seed.
        let mut rng = ChaCha12Rng::seed_from_u64(self.seed);
        rng.set_stream(i_trial as u64);

        let viruses = vec![template.clone(); self.cfg.patient.n_viruses];
        let mut patient = Patient::new(viruses, self.cfg.patient.max_pop);

        for i_step in 0..protocol.n_steps() {
            if i_step == protocol.n_steps_pre {
                patient.add_prescription(protocol.prescription.as_slice());
                log::debug!(
                    "trial {i_trial}: prescribed {:?} at step {i_step}",
                    patient.prescriptions()
                );
            }

            patient.update(&mut rng);

            tally.total.add(i_step, patient.total_pop());
            tally
                .resistant
                .add(i_step, patient.resistant_pop(&protocol.target_drugs));
        }

        tally.total.end_trial();
        tally.resistant.end_trial();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn treated_config(resistant: bool, mut_prob: f64) -> Config {
        let contents = format!(
            r#"
seed = 12345

[virus]
max_birth_prob = 0.1
clear_prob = 0.05
mut_prob = {mut_prob:?}
resistances = {{ guttagonol = {resistant} }}

[patient]
n_viruses = 100
max_pop = 1000
prescription = ["guttagonol"]

[trials]
n_trials = 50
n_steps_pre = 100
n_steps_post = 100
"#
        );
        Config::parse(&contents).expect("valid config")
    }

    #[test]
    fn pure_clearance_dies_out() {
        let contents = r#"
seed = 1

[virus]
max_birth_prob = 0.0
clear_prob = 0.05

[patient]
n_viruses = 100
max_pop = 1000

[trials]
n_trials = 1000
n_steps = 300
"#;
        let engine = Engine::new(Config::parse(contents).expect("valid config"))
            .expect("engine with fixed seed");
        let record = engine.simulate_without_drug();
        let mean = &record.total.mean;

        assert_eq!(mean.len(), 300);
        assert!(mean.windows(2).all(|pair| pair[1] <= pair[0]));
        assert!(mean[299] < 0.01, "final population {}", mean[299]);
        assert_eq!(record.treatment_step, None);
        assert!(record.resistant.is_none());
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let first = Engine::new(treated_config(false, 0.005))
            .expect("engine")
            .simulate_with_drug();
        let second = Engine::new(treated_config(false, 0.005))
            .expect("engine")
            .simulate_with_drug();

        assert_eq!(first.seed, 12345);
        assert_eq!(first.n_trials, 50);
        assert_eq!(first.total, second.total);
        assert_eq!(first.resistant, second.resistant);
    }

    #[test]
    fn resistant_never_exceeds_total() {
        let record = Engine::new(treated_config(false, 0.05))
            .expect("engine")
            .simulate_with_drug();
        let resistant = record.resistant.expect("treated record");

        assert_eq!(record.total.mean.len(), 200);
        assert_eq!(resistant.mean.len(), 200);
        assert!(
            resistant
                .mean
                .iter()
                .zip(&record.total.mean)
                .all(|(res, tot)| res <= tot)
        );
    }

    #[test]
    fn susceptible_population_declines_under_treatment() {
        let record = Engine::new(treated_config(false, 0.0))
            .expect("engine")
            .simulate_with_drug();
        let treatment_step = record.treatment_step.expect("treated record");
        let resistant = record.resistant.expect("treated record");

        assert_eq!(treatment_step, 100);
        assert!(resistant.mean.iter().all(|&val| val == 0.0));
        assert!(
            record.total.mean[treatment_step..]
                .windows(2)
                .all(|pair| pair[1] <= pair[0])
        );
        assert!(record.total.mean[treatment_step - 1] > 100.0);
    }

    #[test]
    fn fully_resistant_population_is_unaffected() {
        let record = Engine::new(treated_config(true, 0.0))
            .expect("engine")
            .simulate_with_drug();
        let resistant = record.resistant.expect("treated record");

        assert_eq!(resistant.mean, record.total.mean);
        assert!(record.total.mean[199] > 100.0);
    }

    #[test]
    fn untreated_protocol_counts_everyone() {
        let engine = Engine::new(treated_config(false, 0.0)).expect("engine");
        let tally = engine.run_trials(&engine.cfg.simple_virus(), &Protocol::untreated(20));

        assert_eq!(tally.total.n_trials(), 50);
        assert_eq!(tally.total.report().mean, tally.resistant.report().mean);
    }
}

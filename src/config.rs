use crate::model::{ResistantVirus, SimpleVirus};
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Seed of the random number streams (random if absent).
    pub seed: Option<u64>,

    pub virus: VirusConfig,
    pub patient: PatientConfig,
    #[serde(default)]
    pub trials: TrialsConfig,
}

/// Virus particle parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VirusConfig {
    /// Maximum reproduction probability.
    pub max_birth_prob: f64,
    /// Clearance probability.
    pub clear_prob: f64,
    /// Probability of flipping each resistance trait in an offspring.
    #[serde(default)]
    pub mut_prob: f64,
    /// Initial resistance to each drug.
    #[serde(default)]
    pub resistances: BTreeMap<String, bool>,
}

/// Patient parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatientConfig {
    /// Initial number of viruses.
    pub n_viruses: usize,
    /// Maximum virus population.
    pub max_pop: usize,
    /// Drugs administered once the treatment starts.
    #[serde(default)]
    pub prescription: Vec<String>,
    /// Drugs against which the resistant population is measured.
    pub target_drugs: Option<Vec<String>>,
}

/// Trial repetition and horizon parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrialsConfig {
    /// Number of independent trials.
    pub n_trials: usize,
    /// Number of steps of the simple scenario.
    pub n_steps: usize,
    /// Number of steps before the treatment starts.
    pub n_steps_pre: usize,
    /// Number of steps after the treatment starts.
    pub n_steps_post: usize,
}

impl Default for TrialsConfig {
    fn default() -> Self {
        Self {
            n_trials: 100,
            n_steps: 300,
            n_steps_pre: 150,
            n_steps_post: 150,
        }
    }
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::parse(&contents)
    }

    /// Parse and validate a [`Config`] from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Seed particle of the simple scenario.
    pub fn simple_virus(&self) -> SimpleVirus {
        SimpleVirus::new(self.virus.max_birth_prob, self.virus.clear_prob)
    }

    /// Seed particle of the treated scenario.
    ///
    /// Prescribed drugs missing from the configured resistances are added as non-resistant.
    pub fn resistant_virus(&self) -> ResistantVirus {
        let mut resistances = self.virus.resistances.clone();
        for drug in &self.patient.prescription {
            resistances.entry(drug.clone()).or_insert(false);
        }
        ResistantVirus::new(
            self.virus.max_birth_prob,
            self.virus.clear_prob,
            resistances,
            self.virus.mut_prob,
        )
    }

    /// Drugs against which the resistant population is measured.
    pub fn target_drugs(&self) -> &[String] {
        self.patient
            .target_drugs
            .as_deref()
            .unwrap_or(&self.patient.prescription)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.virus.max_birth_prob, 0.0..=1.0)
            .context("invalid maximum birth probability")?;
        check_num(self.virus.clear_prob, 0.0..=1.0).context("invalid clearance probability")?;
        check_num(self.virus.mut_prob, 0.0..=1.0).context("invalid mutation probability")?;
        check_drugs(self.virus.resistances.keys()).context("invalid resistances")?;

        check_num(self.patient.n_viruses, 1..).context("invalid initial number of viruses")?;
        check_num(self.patient.max_pop, 1..).context("invalid maximum population")?;
        check_drugs(&self.patient.prescription).context("invalid prescription")?;
        check_drugs(self.target_drugs()).context("invalid target drugs")?;

        check_num(self.trials.n_trials, 1..).context("invalid number of trials")?;
        check_num(self.trials.n_steps, 1..).context("invalid number of steps")?;
        check_num(self.trials.n_steps_pre, 1..)
            .context("invalid number of steps before treatment")?;
        check_num(self.trials.n_steps_post, 1..)
            .context("invalid number of steps after treatment")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_drugs<'a, I>(drugs: I) -> Result<()>
where
    I: IntoIterator<Item = &'a String>,
{
    if drugs.into_iter().any(|drug| drug.trim().is_empty()) {
        bail!("drug names must not be empty");
    }
    Ok(())
}

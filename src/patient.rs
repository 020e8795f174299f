use crate::model::Virus;
use rand::Rng;

/// Counts of a single population update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCounts {
    pub cleared: usize,
    pub survived: usize,
    pub offspring: usize,
}

impl StepCounts {
    /// Total population at the end of the step.
    pub fn total(&self) -> usize {
        self.survived + self.offspring
    }
}

/// Virus population hosted by a single patient.
///
/// Holds the live particles, the population ceiling used to compute density,
/// and the drugs currently administered (in prescription order).
pub struct Patient<V: Virus> {
    viruses: Vec<V>,
    max_pop: usize,
    prescriptions: Vec<String>,
}

impl<V: Virus> Patient<V> {
    /// Create an untreated patient. `max_pop` must be positive.
    pub fn new(viruses: Vec<V>, max_pop: usize) -> Self {
        Self {
            viruses,
            max_pop,
            prescriptions: Vec::new(),
        }
    }

    pub fn total_pop(&self) -> usize {
        self.viruses.len()
    }

    pub fn prescriptions(&self) -> &[String] {
        &self.prescriptions
    }

    /// Administer drugs from now on. Drugs already prescribed are ignored.
    pub fn add_prescription<S: AsRef<str>>(&mut self, drugs: &[S]) {
        for drug in drugs {
            let drug = drug.as_ref();
            if !self.prescriptions.iter().any(|d| d == drug) {
                self.prescriptions.push(drug.to_string());
            }
        }
    }

    /// Count the viruses resistant to every drug in `drugs`.
    pub fn resistant_pop(&self, drugs: &[String]) -> usize {
        self.viruses
            .iter()
            .filter(|virus| virus.is_resistant_to_all(drugs))
            .count()
    }

    /// Advance the population by one step and return the new total.
    pub fn update<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        self.step(rng).total()
    }

    /// Advance the population by one step.
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R) -> StepCounts {
        let n_before = self.viruses.len();

        // Remove cleared viruses.
        self.viruses.retain(|virus| !virus.does_clear(rng));
        let n_survived = self.viruses.len();

        // Density is fixed for the whole reproduction pass.
        let pop_density = n_survived as f64 / self.max_pop as f64;

        let offspring: Vec<V> = self
            .viruses
            .iter()
            .filter_map(|virus| virus.reproduce(pop_density, &self.prescriptions, rng).ok())
            .collect();
        let n_offspring = offspring.len();

        self.viruses.extend(offspring);

        StepCounts {
            cleared: n_before - n_survived,
            survived: n_survived,
            offspring: n_offspring,
        }
    }
}

use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use std::{collections::BTreeMap, fmt};

/// Outcome of a reproduction attempt that produced no offspring.
///
/// This is ordinary control flow: most attempts end this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoOffspring;

impl fmt::Display for NoOffspring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "virus particle did not reproduce")
    }
}

impl std::error::Error for NoOffspring {}

/// A virus particle living inside a patient.
///
/// Particles are never modified: reproduction always yields a new particle.
pub trait Virus: Clone {
    /// Decide whether the particle is cleared from the patient in this step.
    fn does_clear<R: Rng + ?Sized>(&self, rng: &mut R) -> bool;

    /// Attempt to reproduce under the given population density and active drugs.
    fn reproduce<R: Rng + ?Sized>(
        &self,
        pop_density: f64,
        active_drugs: &[String],
        rng: &mut R,
    ) -> Result<Self, NoOffspring>;

    /// Get the resistance of the particle to a drug.
    fn is_resistant_to(&self, drug: &str) -> bool;

    /// Check resistance against every drug in `drugs` (true for an empty list).
    fn is_resistant_to_all(&self, drugs: &[String]) -> bool {
        drugs.iter().all(|drug| self.is_resistant_to(drug))
    }
}

/// Virus particle without any drug resistance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleVirus {
    max_birth_prob: f64,
    clear_prob: f64,
}

impl SimpleVirus {
    pub fn new(max_birth_prob: f64, clear_prob: f64) -> Self {
        Self {
            max_birth_prob,
            clear_prob,
        }
    }

    pub fn max_birth_prob(&self) -> f64 {
        self.max_birth_prob
    }

    pub fn clear_prob(&self) -> f64 {
        self.clear_prob
    }

    fn gives_birth<R: Rng + ?Sized>(&self, pop_density: f64, rng: &mut R) -> bool {
        occurs(self.max_birth_prob * (1.0 - pop_density), rng)
    }
}

impl Virus for SimpleVirus {
    fn does_clear<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        occurs(self.clear_prob, rng)
    }

    fn reproduce<R: Rng + ?Sized>(
        &self,
        pop_density: f64,
        active_drugs: &[String],
        rng: &mut R,
    ) -> Result<Self, NoOffspring> {
        if !self.is_resistant_to_all(active_drugs) || !self.gives_birth(pop_density, rng) {
            return Err(NoOffspring);
        }
        Ok(*self)
    }

    fn is_resistant_to(&self, _drug: &str) -> bool {
        false
    }
}

/// Virus particle carrying a resistance flag per drug.
///
/// Offspring inherit each flag of the parent, flipping it with probability `mut_prob`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResistantVirus {
    base: SimpleVirus,
    resistances: BTreeMap<String, bool>,
    mut_prob: f64,
}

impl ResistantVirus {
    pub fn new(
        max_birth_prob: f64,
        clear_prob: f64,
        resistances: BTreeMap<String, bool>,
        mut_prob: f64,
    ) -> Self {
        Self {
            base: SimpleVirus::new(max_birth_prob, clear_prob),
            resistances,
            mut_prob,
        }
    }

    pub fn resistances(&self) -> &BTreeMap<String, bool> {
        &self.resistances
    }
}

impl Virus for ResistantVirus {
    fn does_clear<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.base.does_clear(rng)
    }

    fn reproduce<R: Rng + ?Sized>(
        &self,
        pop_density: f64,
        active_drugs: &[String],
        rng: &mut R,
    ) -> Result<Self, NoOffspring> {
        // Only particles resistant to every active drug may reproduce.
        if !self.is_resistant_to_all(active_drugs) {
            return Err(NoOffspring);
        }

        // Each trait mutates independently of the others.
        let resistances = self
            .resistances
            .iter()
            .map(|(drug, &resistant)| {
                let flip = occurs(self.mut_prob, rng);
                (drug.clone(), resistant != flip)
            })
            .collect();

        if !self.base.gives_birth(pop_density, rng) {
            return Err(NoOffspring);
        }

        Ok(Self {
            base: self.base,
            resistances,
            mut_prob: self.mut_prob,
        })
    }

    fn is_resistant_to(&self, drug: &str) -> bool {
        self.resistances.get(drug).copied().unwrap_or(false)
    }
}

/// Sample an event of probability `prob`, saturating outside `[0, 1]`.
fn occurs<R: Rng + ?Sized>(prob: f64, rng: &mut R) -> bool {
    // NaN fails to build a distribution and counts as an impossible event.
    match Bernoulli::new(prob.clamp(0.0, 1.0)) {
        Ok(dist) => dist.sample(rng),
        Err(_) => false,
    }
}

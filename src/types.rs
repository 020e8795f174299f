//! Simulation result types.

use serde::{Deserialize, Serialize};

/// Simulated scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Simple viruses in an untreated patient.
    Simple,
    /// Resistant viruses in a patient treated halfway through.
    Treated,
}

/// Per-step statistics of a population count over all trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Average count at each step.
    pub mean: Vec<f64>,
    /// Sample standard deviation across trials at each step.
    pub std_dev: Vec<f64>,
}

/// Results of a complete run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Record {
    pub scenario: Scenario,

    /// Seed from which every trial stream was derived.
    pub seed: u64,

    pub n_trials: usize,

    /// Step index from which the prescription is active.
    pub treatment_step: Option<usize>,

    /// Total virus population.
    pub total: Series,

    /// Population resistant to all target drugs (treated scenario only).
    pub resistant: Option<Series>,
}

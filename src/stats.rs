use crate::types::Series;

/// Per-step sums of a count over independent trials.
///
/// Sums are kept as integers so that partial tallies can be merged in any order.
#[derive(Clone)]
pub struct StepTally {
    n_trials: u64,
    sum: Vec<u64>,
    sum_sq: Vec<u128>,
}

impl StepTally {
    pub fn new(n_steps: usize) -> Self {
        Self {
            n_trials: 0,
            sum: vec![0; n_steps],
            sum_sq: vec![0; n_steps],
        }
    }

    /// Add the value observed at step `i_step` of the current trial.
    pub fn add(&mut self, i_step: usize, val: usize) {
        let val = val as u64;
        self.sum[i_step] += val;
        self.sum_sq[i_step] += (val as u128).pow(2);
    }

    /// Mark the current trial as complete.
    pub fn end_trial(&mut self) {
        self.n_trials += 1;
    }

    pub fn merge(mut self, other: Self) -> Self {
        self.n_trials += other.n_trials;
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += b;
        }
        for (a, b) in self.sum_sq.iter_mut().zip(&other.sum_sq) {
            *a += b;
        }
        self
    }

    pub fn n_trials(&self) -> u64 {
        self.n_trials
    }

    pub fn report(&self) -> Series {
        let n = self.n_trials as f64;
        let mean = self.sum.iter().map(|&sum| sum as f64 / n).collect();
        let std_dev = self
            .sum
            .iter()
            .zip(&self.sum_sq)
            .map(|(&sum, &sum_sq)| {
                if self.n_trials < 2 {
                    return f64::NAN;
                }
                let sum = sum as f64;
                let var = (sum_sq as f64 - sum * sum / n) / (n - 1.0);
                var.max(0.0).sqrt()
            })
            .collect();
        Series { mean, std_dev }
    }
}

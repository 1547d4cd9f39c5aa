//! Mean/stdev summaries and sigma cutoffs.

use serde::{Deserialize, Serialize};

use super::moments::{mean, population_stdev};

/// Descriptive summary of a population of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values summarized.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Population standard deviation.
    pub stdev: f64,
}

impl Summary {
    /// Summarize `values`. Returns `None` for an empty population.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        Some(Summary {
            count: values.len(),
            mean: mean(values)?,
            stdev: population_stdev(values)?,
        })
    }

    /// Cutoff `mean + sigmas * stdev`.
    pub fn threshold(&self, sigmas: f64) -> f64 {
        sigma_threshold(self.mean, self.stdev, sigmas)
    }

    /// True when `value` lies strictly above the `sigmas` cutoff.
    pub fn exceeds(&self, value: f64, sigmas: f64) -> bool {
        value > self.threshold(sigmas)
    }
}

/// `mean + sigmas * stdev`.
pub fn sigma_threshold(mean: f64, stdev: f64, sigmas: f64) -> f64 {
    mean + sigmas * stdev
}

//! Outlier detection and adjustment.
//!
//! Four stages, applied in order to one project's series:
//! 1. [`threshold`]: global `mean + k·stdev` cutoff over the whole series
//! 2. [`detect`]: records strictly above that cutoff
//! 3. [`local`]: each flagged record re-checked against a calendar window
//!    around its date (its own date excluded); genuine local spikes are
//!    pulled down to `local_mean + r·local_stdev`
//! 4. [`rescale`]: relative engagement recomputed against the new maximum
//!
//! Local evaluation always reads the original series, so the order in which
//! outliers are processed does not change the result.

pub mod detect;
pub mod local;
pub mod rescale;
pub mod threshold;

pub use detect::{detect_outliers, Outlier};
pub use local::{evaluate_outlier, window_bounds, window_values, Decision, LocalEvaluation, Window};
pub use rescale::rescale_relative;
pub use threshold::{global_threshold, GlobalThreshold};

use oa_common::{Error, ProjectSeries, Result};
use serde::{Deserialize, Serialize};

/// Default σ multiplier for global and local cutoffs.
pub const DEFAULT_THRESHOLD_SIGMAS: f64 = 4.0;
/// Default σ multiplier for the replacement value.
pub const DEFAULT_REPLACEMENT_SIGMAS: f64 = 1.0;
/// Default half-width of the local window, in months.
pub const DEFAULT_WINDOW_MONTHS: u32 = 6;
/// Relative engagement ceiling after rescale.
pub const DEFAULT_RELATIVE_SCALE: f64 = 100.0;

/// What to do when a flagged record has no other records in its window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyWindowPolicy {
    /// Leave the value unchanged and carry on.
    #[default]
    Skip,
    /// Abort the run with [`oa_common::Error::EmptyWindow`].
    Fail,
}

impl std::fmt::Display for EmptyWindowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyWindowPolicy::Skip => write!(f, "skip"),
            EmptyWindowPolicy::Fail => write!(f, "fail"),
        }
    }
}

/// Tunables for one adjustment run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustParams {
    pub threshold_sigmas: f64,
    pub replacement_sigmas: f64,
    pub window_months: u32,
    pub empty_window: EmptyWindowPolicy,
    pub relative_scale: f64,
}

impl Default for AdjustParams {
    fn default() -> Self {
        AdjustParams {
            threshold_sigmas: DEFAULT_THRESHOLD_SIGMAS,
            replacement_sigmas: DEFAULT_REPLACEMENT_SIGMAS,
            window_months: DEFAULT_WINDOW_MONTHS,
            empty_window: EmptyWindowPolicy::Skip,
            relative_scale: DEFAULT_RELATIVE_SCALE,
        }
    }
}

impl AdjustParams {
    pub fn with_window_months(mut self, months: u32) -> Self {
        self.window_months = months;
        self
    }

    pub fn with_empty_window(mut self, policy: EmptyWindowPolicy) -> Self {
        self.empty_window = policy;
        self
    }
}

/// Result of running all four stages over a series.
#[derive(Debug, Clone, PartialEq)]
pub enum Adjustment {
    /// Nothing exceeded the global threshold; the input is untouched.
    NoOutliers { threshold: GlobalThreshold },
    /// At least one outlier was evaluated; `series` is the corrected,
    /// rescaled working copy.
    Adjusted {
        threshold: GlobalThreshold,
        evaluations: Vec<LocalEvaluation>,
        series: ProjectSeries,
        max_engagement: f64,
    },
}

impl Adjustment {
    pub fn threshold(&self) -> &GlobalThreshold {
        match self {
            Adjustment::NoOutliers { threshold } | Adjustment::Adjusted { threshold, .. } => {
                threshold
            }
        }
    }

    /// Number of records whose value was replaced.
    pub fn replaced_count(&self) -> usize {
        match self {
            Adjustment::NoOutliers { .. } => 0,
            Adjustment::Adjusted { evaluations, .. } => {
                evaluations.iter().filter(|e| e.decision.is_replaced()).count()
            }
        }
    }
}

/// Run threshold → detect → local re-evaluation → rescale over `series`.
///
/// `series` itself is never modified; replacements are applied to a copy.
pub fn adjust_series(series: &ProjectSeries, params: &AdjustParams) -> Result<Adjustment> {
    let threshold = global_threshold(series, params.threshold_sigmas)?;
    let outliers = detect_outliers(series, threshold.value);
    if outliers.is_empty() {
        return Ok(Adjustment::NoOutliers { threshold });
    }

    let evaluations = outliers
        .iter()
        .map(|o| evaluate_outlier(series, o, params))
        .collect::<Result<Vec<_>>>()?;

    let mut working = series.clone();
    apply_evaluations(&mut working, &evaluations);
    let max_engagement =
        rescale_relative(&mut working, params.relative_scale).map_err(|err| match err {
            Error::DegenerateScale { max, .. } => Error::DegenerateScale {
                max,
                replaced: evaluations.iter().filter(|e| e.decision.is_replaced()).count(),
            },
            other => other,
        })?;

    Ok(Adjustment::Adjusted {
        threshold,
        evaluations,
        series: working,
        max_engagement,
    })
}

/// Write every replacement decision into `working`.
pub fn apply_evaluations(working: &mut ProjectSeries, evaluations: &[LocalEvaluation]) {
    let records = working.records_mut();
    for eval in evaluations {
        if let Decision::Replaced { new_value } = eval.decision {
            if let Some(record) = records.get_mut(eval.outlier.index) {
                record.total_engagement = new_value;
            }
        }
    }
}

//! Local re-evaluation of globally flagged records.
//!
//! A record that is extreme against the whole series may still be ordinary
//! for its own period. Each outlier is compared with the records dated
//! within `window_months` calendar months of it, excluding every record on
//! the outlier's own date. Only when it also clears the local cutoff is its
//! value replaced.

use chrono::{Months, NaiveDate};
use oa_common::{Error, ProjectSeries, Result};
use oa_math::Summary;
use serde::{Deserialize, Serialize};

use super::detect::Outlier;
use super::{AdjustParams, EmptyWindowPolicy};

/// Closed calendar interval around an outlier's date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Outcome of one local evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// Above the local cutoff; value pulled down to `new_value`.
    Replaced { new_value: f64 },
    /// Within expected local variation; value kept.
    Unchanged,
    /// No comparison records in the window; value kept.
    SkippedEmptyWindow,
}

impl Decision {
    pub fn is_replaced(&self) -> bool {
        matches!(self, Decision::Replaced { .. })
    }

    /// Replacement value, when one was assigned.
    pub fn new_value(&self) -> Option<f64> {
        match self {
            Decision::Replaced { new_value } => Some(*new_value),
            _ => None,
        }
    }
}

/// Everything computed while re-evaluating one outlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEvaluation {
    pub outlier: Outlier,
    pub window: Window,
    /// Statistics of the comparison records; `None` when the window is empty.
    pub local: Option<Summary>,
    /// `local.mean + threshold_sigmas * local.stdev`.
    pub local_threshold: Option<f64>,
    pub decision: Decision,
}

/// `[date - months, date + months]`, with the day clamped to the end of the
/// target month (Aug 31 - 6 months is Feb 28/29). Saturates at the
/// representable date range.
pub fn window_bounds(date: NaiveDate, months: u32) -> Window {
    let span = Months::new(months);
    Window {
        start: date.checked_sub_months(span).unwrap_or(NaiveDate::MIN),
        end: date.checked_add_months(span).unwrap_or(NaiveDate::MAX),
    }
}

/// `total_engagement` of every record inside `window` whose date differs
/// from `exclude`.
pub fn window_values(series: &ProjectSeries, window: Window, exclude: NaiveDate) -> Vec<f64> {
    series
        .records()
        .iter()
        .filter(|r| r.date != exclude && window.contains(r.date))
        .map(|r| r.total_engagement)
        .collect()
}

/// Re-evaluate `outlier` against its local window in `original`.
///
/// `original` must be the unadjusted series: other outliers stay in each
/// other's windows with their original values.
pub fn evaluate_outlier(
    original: &ProjectSeries,
    outlier: &Outlier,
    params: &AdjustParams,
) -> Result<LocalEvaluation> {
    let window = window_bounds(outlier.date, params.window_months);
    let values = window_values(original, window, outlier.date);

    let Some(local) = Summary::from_values(&values) else {
        return match params.empty_window {
            EmptyWindowPolicy::Skip => Ok(LocalEvaluation {
                outlier: *outlier,
                window,
                local: None,
                local_threshold: None,
                decision: Decision::SkippedEmptyWindow,
            }),
            EmptyWindowPolicy::Fail => Err(Error::EmptyWindow { date: outlier.date }),
        };
    };

    let local_threshold = local.threshold(params.threshold_sigmas);
    let decision = if local.exceeds(outlier.value, params.threshold_sigmas) {
        Decision::Replaced {
            new_value: local.threshold(params.replacement_sigmas),
        }
    } else {
        Decision::Unchanged
    };

    Ok(LocalEvaluation {
        outlier: *outlier,
        window,
        local: Some(local),
        local_threshold: Some(local_threshold),
        decision,
    })
}

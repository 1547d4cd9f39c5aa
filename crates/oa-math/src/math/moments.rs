//! Sample moments over slices of engagement values.
//!
//! All functions return `None` for empty input instead of NaN so callers
//! are forced to decide what an empty population means for them.

/// Arithmetic mean.
///
/// Uses a compensated (Kahan) sum so long series of similar magnitude do
/// not drift.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(kahan_sum(values) / values.len() as f64)
}

/// Population variance (divisor N, not N-1).
///
/// Two-pass: the mean is computed first, then squared deviations are summed.
pub fn population_variance(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let mut sum = 0.0;
    let mut comp = 0.0;
    for v in values {
        let d = v - mu;
        let y = d * d - comp;
        let t = sum + y;
        comp = (t - sum) - y;
        sum = t;
    }
    Some((sum / values.len() as f64).max(0.0))
}

/// Population standard deviation (square root of [`population_variance`]).
pub fn population_stdev(values: &[f64]) -> Option<f64> {
    population_variance(values).map(f64::sqrt)
}

/// Largest value, ignoring NaN entries.
///
/// Returns `None` for empty input or when every entry is NaN.
pub fn max_value(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

fn kahan_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut comp = 0.0;
    for v in values {
        let y = v - comp;
        let t = sum + y;
        comp = (t - sum) - y;
        sum = t;
    }
    sum
}

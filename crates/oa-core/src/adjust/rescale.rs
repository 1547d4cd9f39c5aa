//! Relative engagement recomputation.

use oa_common::{Error, ProjectSeries, Result};
use oa_math::max_value;

/// Set every record's `relative_engagement` to `total / max * scale`.
///
/// Returns the maximum used. Fails with [`Error::DegenerateScale`] when the
/// maximum is not positive, since the ratio is undefined.
pub fn rescale_relative(series: &mut ProjectSeries, scale: f64) -> Result<f64> {
    let max = max_value(&series.engagement_values()).unwrap_or(0.0);
    if max <= 0.0 {
        return Err(Error::DegenerateScale { max, replaced: 0 });
    }
    for record in series.records_mut() {
        record.relative_engagement = record.total_engagement / max * scale;
    }
    Ok(max)
}

//! Global outlier threshold over a whole project series.

use oa_common::{Error, ProjectSeries, Result};
use oa_math::Summary;
use serde::{Deserialize, Serialize};

/// Cutoff computed from every record of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalThreshold {
    /// Mean, population stdev and count of `total_engagement`.
    pub summary: Summary,
    /// σ multiplier used.
    pub sigmas: f64,
    /// `summary.mean + sigmas * summary.stdev`.
    pub value: f64,
}

/// `mean + sigmas · stdev` of all `total_engagement` values.
///
/// With zero variance the cutoff equals the mean, which no record can
/// strictly exceed.
pub fn global_threshold(series: &ProjectSeries, sigmas: f64) -> Result<GlobalThreshold> {
    let values = series.engagement_values();
    let summary = Summary::from_values(&values).ok_or(Error::NoProjectData {
        project_id: series.project_id(),
    })?;
    Ok(GlobalThreshold {
        summary,
        sigmas,
        value: summary.threshold(sigmas),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use oa_common::{ProjectId, Record};

    fn series(values: &[f64]) -> ProjectSeries {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::new(ProjectId(2), start + Duration::days(i as i64), *v, 0.0))
            .collect();
        ProjectSeries::new(ProjectId(2), records).unwrap()
    }

    #[test]
    fn threshold_is_mean_plus_four_sigma() {
        let t = global_threshold(&series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 4.0).unwrap();
        assert!((t.summary.mean - 5.0).abs() < 1e-12);
        assert!((t.summary.stdev - 2.0).abs() < 1e-12);
        assert!((t.value - 13.0).abs() < 1e-12);
        assert_eq!(t.summary.count, 8);
    }

    #[test]
    fn zero_variance_threshold_is_mean() {
        let t = global_threshold(&series(&[7.0; 5]), 4.0).unwrap();
        assert_eq!(t.value, 7.0);
    }

    #[test]
    fn custom_sigmas() {
        let t = global_threshold(&series(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.5).unwrap();
        assert!((t.value - 10.0).abs() < 1e-12);
    }
}

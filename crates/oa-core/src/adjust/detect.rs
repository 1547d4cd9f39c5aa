//! Outlier selection against the global threshold.

use chrono::NaiveDate;
use oa_common::ProjectSeries;
use serde::{Deserialize, Serialize};

/// A record flagged against the global threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outlier {
    /// Position within the series.
    pub index: usize,
    pub date: NaiveDate,
    /// Original `total_engagement`.
    pub value: f64,
}

/// Records whose `total_engagement` is strictly greater than `threshold`,
/// in series order.
pub fn detect_outliers(series: &ProjectSeries, threshold: f64) -> Vec<Outlier> {
    series
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| r.total_engagement > threshold)
        .map(|(index, r)| Outlier {
            index,
            date: r.date,
            value: r.total_engagement,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use oa_common::{ProjectId, Record};

    fn series(values: &[f64]) -> ProjectSeries {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let records = values
            .iter()
            .enumerate()
            .map(|(i, v)| Record::new(ProjectId(1), start + Duration::days(i as i64), *v, 0.0))
            .collect();
        ProjectSeries::new(ProjectId(1), records).unwrap()
    }

    #[test]
    fn selects_strictly_greater() {
        let s = series(&[1.0, 5.0, 10.0, 10.5]);
        let out = detect_outliers(&s, 10.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 3);
        assert_eq!(out[0].value, 10.5);
    }

    #[test]
    fn keeps_series_order() {
        let s = series(&[50.0, 1.0, 60.0, 1.0, 70.0]);
        let idx: Vec<usize> = detect_outliers(&s, 10.0).iter().map(|o| o.index).collect();
        assert_eq!(idx, vec![0, 2, 4]);
    }

    #[test]
    fn none_above() {
        let s = series(&[1.0, 2.0, 3.0]);
        assert!(detect_outliers(&s, 3.0).is_empty());
    }
}

//! Dated engagement records and per-project series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::ProjectId;

/// One engagement observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub project_id: ProjectId,
    pub date: NaiveDate,
    /// Raw engagement measurement. Finite and non-negative.
    pub total_engagement: f64,
    /// 0-100 score derived from `total_engagement`.
    pub relative_engagement: f64,
    /// Values of any additional input columns, aligned with
    /// [`ProjectSeries::extra_columns`]. `None` marks an empty cell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Option<String>>,
}

impl Record {
    pub fn new(
        project_id: ProjectId,
        date: NaiveDate,
        total_engagement: f64,
        relative_engagement: f64,
    ) -> Self {
        Record {
            project_id,
            date,
            total_engagement,
            relative_engagement,
            extra: Vec::new(),
        }
    }

    /// Attach pass-through column values.
    pub fn with_extra(mut self, extra: Vec<Option<String>>) -> Self {
        self.extra = extra;
        self
    }
}

/// The date-ordered records of a single project.
///
/// Construction validates that every record belongs to the same project and
/// carries a finite, non-negative engagement value, then sorts by date
/// (stable, so same-date records keep their input order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSeries {
    project_id: ProjectId,
    records: Vec<Record>,
    extra_columns: Vec<String>,
}

impl ProjectSeries {
    /// Build a series. Fails with [`Error::NoProjectData`] when `records` is empty.
    pub fn new(project_id: ProjectId, records: Vec<Record>) -> Result<Self> {
        Self::with_extra_columns(project_id, records, Vec::new())
    }

    /// Build a series that carries additional pass-through columns.
    pub fn with_extra_columns(
        project_id: ProjectId,
        mut records: Vec<Record>,
        extra_columns: Vec<String>,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::NoProjectData { project_id });
        }
        for record in &records {
            if record.project_id != project_id {
                return Err(Error::MixedProjects {
                    expected: project_id,
                    found: record.project_id,
                });
            }
            if !record.total_engagement.is_finite() || record.total_engagement < 0.0 {
                return Err(Error::InvalidEngagement {
                    date: record.date,
                    value: record.total_engagement,
                });
            }
            if !record.extra.is_empty() && record.extra.len() != extra_columns.len() {
                return Err(Error::InvalidInput(format!(
                    "record on {} has {} extra values, expected {}",
                    record.date,
                    record.extra.len(),
                    extra_columns.len()
                )));
            }
        }
        records.sort_by_key(|r| r.date);
        Ok(ProjectSeries {
            project_id,
            records,
            extra_columns,
        })
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Mutable access for in-place adjustment. Dates and project are not
    /// meant to change; only engagement values are.
    pub fn records_mut(&mut self) -> &mut [Record] {
        &mut self.records
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `total_engagement` of every record, in date order.
    pub fn engagement_values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.total_engagement).collect()
    }

    /// Dates of every record, in order.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    /// First and last date covered.
    pub fn date_span(&self) -> (NaiveDate, NaiveDate) {
        // Non-empty by construction.
        let first = self.records[0].date;
        let last = self.records[self.records.len() - 1].date;
        (first, last)
    }
}

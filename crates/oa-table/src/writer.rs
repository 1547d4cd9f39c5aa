//! Arrow-backed CSV writer for adjusted series.
//!
//! Output is written to a temp file next to the destination and renamed into
//! place, so a failed run never leaves a truncated CSV behind.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, RecordBatch, StringArray};
use arrow::csv::WriterBuilder;
use chrono::NaiveDate;
use oa_common::{Error, ProjectId, ProjectSeries};

use crate::dates::format_iso_date;
use crate::schema::{TableLayout, DATE, PROJECT_ID, RELATIVE_ENGAGEMENT, TOTAL_ENGAGEMENT};
use crate::TableError;

/// File name for an adjusted series:
/// `outliers_adjusted_project_<id>_<DD-MM-YYYY>.csv`.
pub fn output_file_name(project_id: ProjectId, run_date: NaiveDate) -> String {
    format!(
        "outliers_adjusted_project_{}_{}.csv",
        project_id,
        run_date.format("%d-%m-%Y")
    )
}

/// Build the output batch: `date` (ISO-8601) first, then the remaining
/// columns of `layout` in input order.
pub fn series_batch(layout: &TableLayout, series: &ProjectSeries) -> Result<RecordBatch, TableError> {
    let schema = layout.output_schema();
    let records = series.records();
    let extra_names = series.extra_columns();

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let array: ArrayRef = match field.name().as_str() {
            DATE => Arc::new(StringArray::from(
                records
                    .iter()
                    .map(|r| format_iso_date(r.date))
                    .collect::<Vec<_>>(),
            )),
            PROJECT_ID => Arc::new(Int64Array::from(
                records.iter().map(|r| r.project_id.0).collect::<Vec<_>>(),
            )),
            TOTAL_ENGAGEMENT => Arc::new(Float64Array::from(
                records.iter().map(|r| r.total_engagement).collect::<Vec<_>>(),
            )),
            RELATIVE_ENGAGEMENT => Arc::new(Float64Array::from(
                records
                    .iter()
                    .map(|r| r.relative_engagement)
                    .collect::<Vec<_>>(),
            )),
            name => {
                let idx = extra_names
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| Error::MissingColumn {
                        column: name.to_string(),
                    })?;
                Arc::new(StringArray::from(
                    records
                        .iter()
                        .map(|r| r.extra.get(idx).cloned().flatten())
                        .collect::<Vec<Option<String>>>(),
                ))
            }
        };
        columns.push(array);
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}

/// Write `series` as CSV to `path`, replacing any existing file atomically.
pub fn write_series(
    path: &Path,
    layout: &TableLayout,
    series: &ProjectSeries,
) -> Result<PathBuf, TableError> {
    let batch = series_batch(layout, series)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("csv.tmp");
    {
        let file = File::create(&temp_path)?;
        let mut writer = WriterBuilder::new().with_header(true).build(file);
        if let Err(e) = writer.write(&batch) {
            drop(writer);
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
    }
    atomic_rename(&temp_path, path)?;

    tracing::debug!(
        path = %path.display(),
        rows = batch.num_rows(),
        "wrote adjusted series"
    );
    Ok(path.to_path_buf())
}

/// Rename temp file to final path atomically.
fn atomic_rename(temp_path: &Path, final_path: &Path) -> Result<(), TableError> {
    fs::rename(temp_path, final_path)?;
    Ok(())
}

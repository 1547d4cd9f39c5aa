//! Arrow-backed CSV loader for engagement tables.
//!
//! The whole file is read up front. Every column is read as text and then
//! parsed per row, so type problems surface as row-level errors instead of
//! schema inference surprises.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, RecordBatch, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema};
use chrono::NaiveDate;
use oa_common::{Error, ProjectId, ProjectSeries, Record};

use crate::dates::parse_date;
use crate::schema::{TableLayout, DATE, PROJECT_ID, RELATIVE_ENGAGEMENT, TOTAL_ENGAGEMENT};
use crate::TableError;

/// Rows per Arrow batch while reading.
const READ_BATCH_SIZE: usize = 8192;

/// A fully parsed engagement table (all projects).
#[derive(Debug, Clone)]
pub struct EngagementTable {
    layout: TableLayout,
    records: Vec<Record>,
}

/// Per-project record count and date span, for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectOverview {
    pub records: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

impl EngagementTable {
    pub fn layout(&self) -> &TableLayout {
        &self.layout
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Isolate one project's records as a date-sorted series.
    ///
    /// Fails with [`Error::NoProjectData`] when the project has no rows.
    pub fn project_series(&self, project_id: ProjectId) -> Result<ProjectSeries, Error> {
        let records: Vec<Record> = self
            .records
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        ProjectSeries::with_extra_columns(project_id, records, self.layout.extra_columns())
    }

    /// Every project present, with counts and date spans.
    pub fn projects(&self) -> BTreeMap<ProjectId, ProjectOverview> {
        let mut out: BTreeMap<ProjectId, ProjectOverview> = BTreeMap::new();
        for r in &self.records {
            out.entry(r.project_id)
                .and_modify(|o| {
                    o.records += 1;
                    o.first_date = o.first_date.min(r.date);
                    o.last_date = o.last_date.max(r.date);
                })
                .or_insert(ProjectOverview {
                    records: 1,
                    first_date: r.date,
                    last_date: r.date,
                });
        }
        out
    }
}

/// Load an engagement CSV.
///
/// Headers are normalized (trimmed, lowercased); the four required columns
/// must be present. Any unparseable date or number aborts the load.
pub fn load_table(path: &Path) -> Result<EngagementTable, TableError> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    let format = Format::default().with_header(true);
    let (inferred, _) = format.infer_schema(&mut file, Some(0))?;
    file.seek(SeekFrom::Start(0))?;

    let headers: Vec<String> = inferred.fields().iter().map(|f| f.name().clone()).collect();
    let layout = TableLayout::from_headers(&headers)?;

    // Read every column as nullable text; parsing happens per row below.
    let text_schema = Arc::new(Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect::<Vec<_>>(),
    ));

    let reader = ReaderBuilder::new(text_schema)
        .with_header(true)
        .with_batch_size(READ_BATCH_SIZE)
        .build(file)?;

    let mut records = Vec::new();
    let mut row_offset = 0usize;
    for batch in reader {
        let batch = batch?;
        parse_batch(&batch, &layout, row_offset, &mut records)?;
        row_offset += batch.num_rows();
    }

    tracing::debug!(
        path = %path.display(),
        rows = records.len(),
        columns = layout.columns().len(),
        "loaded engagement table"
    );

    Ok(EngagementTable { layout, records })
}

fn text_column<'a>(batch: &'a RecordBatch, layout: &TableLayout, name: &str) -> Result<&'a StringArray, Error> {
    let idx = layout.index_of(name).ok_or_else(|| Error::MissingColumn {
        column: name.to_string(),
    })?;
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::InvalidInput(format!("column {name} was not read as text")))
}

fn cell<'a>(col: &'a StringArray, i: usize) -> Option<&'a str> {
    if col.is_null(i) {
        None
    } else {
        Some(col.value(i))
    }
}

fn required<'a>(col: &'a StringArray, i: usize, row: usize, name: &str) -> Result<&'a str, Error> {
    match cell(col, i).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingValue {
            row,
            column: name.to_string(),
        }),
    }
}

fn parse_number(raw: &str, row: usize, name: &str) -> Result<f64, Error> {
    raw.parse::<f64>().map_err(|_| Error::InvalidNumber {
        row,
        column: name.to_string(),
        value: raw.to_string(),
    })
}

fn parse_batch(
    batch: &RecordBatch,
    layout: &TableLayout,
    row_offset: usize,
    out: &mut Vec<Record>,
) -> Result<(), Error> {
    let project_col = text_column(batch, layout, PROJECT_ID)?;
    let date_col = text_column(batch, layout, DATE)?;
    let total_col = text_column(batch, layout, TOTAL_ENGAGEMENT)?;
    let relative_col = text_column(batch, layout, RELATIVE_ENGAGEMENT)?;
    let extra_cols: Vec<&StringArray> = layout
        .extra_columns()
        .iter()
        .map(|name| text_column(batch, layout, name))
        .collect::<Result<_, _>>()?;

    for i in 0..batch.num_rows() {
        // 1-based data row number (header excluded).
        let row = row_offset + i + 1;

        let raw_project = required(project_col, i, row, PROJECT_ID)?;
        let project_id = raw_project
            .parse::<ProjectId>()
            .map_err(|_| Error::InvalidNumber {
                row,
                column: PROJECT_ID.to_string(),
                value: raw_project.to_string(),
            })?;

        let raw_date = required(date_col, i, row, DATE)?;
        let date = parse_date(raw_date).ok_or_else(|| Error::InvalidDate {
            row,
            value: raw_date.to_string(),
        })?;

        let total = parse_number(required(total_col, i, row, TOTAL_ENGAGEMENT)?, row, TOTAL_ENGAGEMENT)?;
        let relative = parse_number(
            required(relative_col, i, row, RELATIVE_ENGAGEMENT)?,
            row,
            RELATIVE_ENGAGEMENT,
        )?;

        let extra = extra_cols
            .iter()
            .map(|col| cell(col, i).map(str::to_string))
            .collect();

        out.push(Record::new(project_id, date, total, relative).with_extra(extra));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn loads_and_normalizes_headers() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "in.csv",
            "Project_ID,Date,Total_Engagement,Relative_Engagement,Channel\n\
             1,2021-01-02,10.5,50,web\n\
             2,2021-01-01,3,100,\n\
             1,2021-01-01,21,100,app\n",
        );
        let table = load_table(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.layout().extra_columns(), vec!["channel".to_string()]);

        let series = table.project_series(ProjectId(1)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.dates(), vec![d(2021, 1, 1), d(2021, 1, 2)]);
        assert_eq!(series.engagement_values(), vec![21.0, 10.5]);
        assert_eq!(series.records()[0].extra, vec![Some("app".to_string())]);

        let other = table.project_series(ProjectId(2)).unwrap();
        assert_eq!(other.records()[0].extra, vec![None]);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_table(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(
            oa_common::Error::from(err),
            Error::FileNotFound { .. }
        ));
    }

    #[test]
    fn missing_required_column() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "in.csv", "project_id,date,total_engagement\n1,2021-01-01,1\n");
        let err: Error = load_table(&path).unwrap_err().into();
        assert!(matches!(err, Error::MissingColumn { column } if column == "relative_engagement"));
    }

    #[test]
    fn bad_date_reports_row() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "in.csv",
            "project_id,date,total_engagement,relative_engagement\n\
             1,2021-01-01,1,1\n\
             1,not-a-date,1,1\n",
        );
        let err: Error = load_table(&path).unwrap_err().into();
        match err {
            Error::InvalidDate { row, value } => {
                assert_eq!(row, 2);
                assert_eq!(value, "not-a-date");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_number_and_missing_value() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "in.csv",
            "project_id,date,total_engagement,relative_engagement\n1,2021-01-01,lots,1\n",
        );
        let err: Error = load_table(&path).unwrap_err().into();
        assert!(matches!(err, Error::InvalidNumber { column, .. } if column == "total_engagement"));

        let path = write_csv(
            &dir,
            "in2.csv",
            "project_id,date,total_engagement,relative_engagement\n1,2021-01-01,,1\n",
        );
        let err: Error = load_table(&path).unwrap_err().into();
        assert!(matches!(err, Error::MissingValue { row: 1, .. }));
    }

    #[test]
    fn unknown_project_is_no_project_data() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "in.csv",
            "project_id,date,total_engagement,relative_engagement\n1,2021-01-01,1,1\n",
        );
        let table = load_table(&path).unwrap();
        let err = table.project_series(ProjectId(99)).unwrap_err();
        assert!(matches!(err, Error::NoProjectData { .. }));
    }

    #[test]
    fn projects_overview() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "in.csv",
            "project_id,date,total_engagement,relative_engagement\n\
             5,2021-03-01,1,1\n\
             5,2021-01-01,1,1\n\
             7,2020-06-15,1,1\n",
        );
        let table = load_table(&path).unwrap();
        let projects = table.projects();
        assert_eq!(projects.len(), 2);
        let five = projects[&ProjectId(5)];
        assert_eq!(five.records, 2);
        assert_eq!(five.first_date, d(2021, 1, 1));
        assert_eq!(five.last_date, d(2021, 3, 1));
    }
}

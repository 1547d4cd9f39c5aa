//! Column layout for engagement tables.
//!
//! Input headers are matched case-insensitively: every header is trimmed and
//! lowercased before lookup, and the normalized names are what gets written
//! back out.

use arrow::datatypes::{DataType, Field, Schema};
use oa_common::Error;
use std::sync::Arc;

pub const PROJECT_ID: &str = "project_id";
pub const DATE: &str = "date";
pub const TOTAL_ENGAGEMENT: &str = "total_engagement";
pub const RELATIVE_ENGAGEMENT: &str = "relative_engagement";

/// Columns every engagement table must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = [PROJECT_ID, DATE, TOTAL_ENGAGEMENT, RELATIVE_ENGAGEMENT];

/// Normalize a raw header: strip a UTF-8 BOM and whitespace, lowercase.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Normalized column names of a loaded table, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    columns: Vec<String>,
}

impl TableLayout {
    /// Normalize `headers` and check that every required column is present
    /// exactly once.
    pub fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self, Error> {
        let mut columns: Vec<String> = Vec::with_capacity(headers.len());
        for raw in headers {
            let name = normalize_column_name(raw.as_ref());
            if columns.contains(&name) {
                return Err(Error::DuplicateColumn { column: name });
            }
            columns.push(name);
        }
        for required in REQUIRED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                return Err(Error::MissingColumn {
                    column: required.to_string(),
                });
            }
        }
        Ok(TableLayout { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a normalized column name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Columns that are carried through untouched, in input order.
    pub fn extra_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| !REQUIRED_COLUMNS.contains(&c.as_str()))
            .cloned()
            .collect()
    }

    /// Schema of the adjusted output: `date` first (as the index column),
    /// then every other column in input order.
    pub fn output_schema(&self) -> Arc<Schema> {
        let mut fields = vec![Field::new(DATE, DataType::Utf8, false)];
        for column in self.columns.iter().filter(|c| c.as_str() != DATE) {
            let field = match column.as_str() {
                PROJECT_ID => Field::new(PROJECT_ID, DataType::Int64, false),
                TOTAL_ENGAGEMENT => Field::new(TOTAL_ENGAGEMENT, DataType::Float64, false),
                RELATIVE_ENGAGEMENT => Field::new(RELATIVE_ENGAGEMENT, DataType::Float64, false),
                other => Field::new(other, DataType::Utf8, true),
            };
            fields.push(field);
        }
        Arc::new(Schema::new(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_case_space_and_bom() {
        assert_eq!(normalize_column_name(" Project_ID "), "project_id");
        assert_eq!(normalize_column_name("\u{feff}Date"), "date");
    }

    #[test]
    fn layout_accepts_mixed_case_headers() {
        let layout = TableLayout::from_headers(&[
            "Project_ID",
            "DATE",
            "Total_Engagement",
            "Relative_Engagement",
            "Channel",
        ])
        .unwrap();
        assert_eq!(layout.index_of("date"), Some(1));
        assert_eq!(layout.extra_columns(), vec!["channel".to_string()]);
    }

    #[test]
    fn layout_missing_column() {
        let err = TableLayout::from_headers(&["project_id", "date", "total_engagement"]).unwrap_err();
        match err {
            Error::MissingColumn { column } => assert_eq!(column, "relative_engagement"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn layout_duplicate_after_normalization() {
        let err = TableLayout::from_headers(&[
            "project_id",
            "Date",
            "date ",
            "total_engagement",
            "relative_engagement",
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn { column } if column == "date"));
    }

    #[test]
    fn output_schema_puts_date_first() {
        let layout = TableLayout::from_headers(&[
            "project_id",
            "total_engagement",
            "note",
            "date",
            "relative_engagement",
        ])
        .unwrap();
        let schema = layout.output_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "date",
                "project_id",
                "total_engagement",
                "note",
                "relative_engagement"
            ]
        );
        assert_eq!(schema.field(1).data_type(), &DataType::Int64);
        assert_eq!(schema.field(2).data_type(), &DataType::Float64);
        assert_eq!(schema.field(3).data_type(), &DataType::Utf8);
    }
}

//! Error types for outlier adjustment.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ No Data For Project
//!   Reason: no records found for project 42
//!   Fix: Run 'oa-core check <file>' to list the projects present in the input.
//! ```
//!
//! # Machine-Facing Output
//!
//! ```json
//! {
//!   "code": 20,
//!   "category": "data",
//!   "message": "no records found for project 42",
//!   "recoverable": true,
//!   "context": { "project_id": 42 }
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::id::ProjectId;

/// Result type alias for outlier adjustment operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Unreadable or malformed input file.
    Input,
    /// Input parsed but the selected data is unusable.
    Data,
    /// The adjustment itself could not produce a defined result.
    Analysis,
    /// Configuration file errors.
    Config,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Input => write!(f, "input"),
            ErrorCategory::Data => write!(f, "data"),
            ErrorCategory::Analysis => write!(f, "analysis"),
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for outlier adjustment.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("input file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("missing required column: {column}")]
    MissingColumn { column: String },

    #[error("duplicate column after normalization: {column}")]
    DuplicateColumn { column: String },

    #[error("row {row}: unparseable date {value:?}")]
    InvalidDate { row: usize, value: String },

    #[error("row {row}: invalid {column} value {value:?}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: missing value for {column}")]
    MissingValue { row: usize, column: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid value {value:?} for {name}")]
    InvalidArgument { name: String, value: String },

    // Data errors (20-29)
    #[error("no records found for project {project_id}")]
    NoProjectData { project_id: ProjectId },

    #[error("record for project {found} in series of project {expected}")]
    MixedProjects {
        expected: ProjectId,
        found: ProjectId,
    },

    #[error("engagement on {date} must be finite and non-negative, got {value}")]
    InvalidEngagement { date: NaiveDate, value: f64 },

    // Analysis errors (30-39)
    #[error("no comparison records in the window around {date}")]
    EmptyWindow { date: NaiveDate },

    #[error(
        "cannot rescale relative engagement: maximum engagement is {max} after {replaced} replacement(s)"
    )]
    DegenerateScale { max: f64, replaced: usize },

    // Configuration errors (40-49)
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Input errors
    /// - 20-29: Data errors
    /// - 30-39: Analysis errors
    /// - 40-49: Configuration errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::FileNotFound { .. } => 10,
            Error::MissingColumn { .. } => 11,
            Error::DuplicateColumn { .. } => 12,
            Error::InvalidDate { .. } => 13,
            Error::InvalidNumber { .. } => 14,
            Error::MissingValue { .. } => 15,
            Error::InvalidInput(_) => 16,
            Error::InvalidArgument { .. } => 17,
            Error::NoProjectData { .. } => 20,
            Error::MixedProjects { .. } => 21,
            Error::InvalidEngagement { .. } => 22,
            Error::EmptyWindow { .. } => 30,
            Error::DegenerateScale { .. } => 31,
            Error::Config(_) => 40,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileNotFound { .. }
            | Error::MissingColumn { .. }
            | Error::DuplicateColumn { .. }
            | Error::InvalidDate { .. }
            | Error::InvalidNumber { .. }
            | Error::MissingValue { .. }
            | Error::InvalidInput(_)
            | Error::InvalidArgument { .. } => ErrorCategory::Input,

            Error::NoProjectData { .. }
            | Error::MixedProjects { .. }
            | Error::InvalidEngagement { .. } => ErrorCategory::Data,

            Error::EmptyWindow { .. } | Error::DegenerateScale { .. } => ErrorCategory::Analysis,

            Error::Config(_) => ErrorCategory::Config,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by the user.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Fixing the file or the arguments resolves these
            Error::FileNotFound { .. } => true,
            Error::MissingColumn { .. } => true,
            Error::DuplicateColumn { .. } => true,
            Error::InvalidDate { .. } => true,
            Error::InvalidNumber { .. } => true,
            Error::MissingValue { .. } => true,
            Error::InvalidInput(_) => true,
            Error::InvalidArgument { .. } => true,

            Error::NoProjectData { .. } => true,
            Error::MixedProjects { .. } => false, // loader bug
            Error::InvalidEngagement { .. } => true,

            Error::EmptyWindow { .. } => true, // widen window or switch policy
            Error::DegenerateScale { .. } => false,

            Error::Config(_) => true,

            Error::Io(_) => true,
            Error::Json(_) => false,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::FileNotFound { .. } => "Check the file path and that the file is readable.",
            Error::MissingColumn { .. } => {
                "The CSV needs project_id, date, total_engagement and relative_engagement columns (any case)."
            }
            Error::DuplicateColumn { .. } => {
                "Two headers differ only by case or whitespace. Rename or drop one of them."
            }
            Error::InvalidDate { .. } => {
                "Use an unambiguous date format such as YYYY-MM-DD for the date column."
            }
            Error::InvalidNumber { .. } => {
                "Engagement columns must be plain decimal numbers; project_id must be an integer."
            }
            Error::MissingValue { .. } => "Fill in or remove rows with empty required cells.",
            Error::InvalidInput(_) => "Check the input file for structural problems.",
            Error::InvalidArgument { .. } => "See 'oa-core --help' for accepted values.",

            Error::NoProjectData { .. } => {
                "Run 'oa-core check <file>' to list the projects present in the input."
            }
            Error::MixedProjects { .. } => "Internal error. Please report with the input file.",
            Error::InvalidEngagement { .. } => {
                "total_engagement must be a finite, non-negative number for every row."
            }

            Error::EmptyWindow { .. } => {
                "Increase --month-range, or set \"empty_window\": \"skip\" in the config."
            }
            Error::DegenerateScale { replaced: 0, .. } => {
                "Every engagement value is zero, so relative engagement is undefined."
            }
            Error::DegenerateScale { .. } => {
                "The adjustment zeroed the series: every replaced outlier had only zero-valued \
                 neighbours. Widen --month-range so windows reach non-zero records."
            }

            Error::Config(_) => "Fix the configuration file or remove it to use defaults.",

            Error::Io(_) => "Check disk space, permissions, and that directories exist.",
            Error::Json(_) => "Internal serialization error. Please report.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::FileNotFound { .. } => "Input File Not Found",
            Error::MissingColumn { .. } => "Missing Column",
            Error::DuplicateColumn { .. } => "Duplicate Column",
            Error::InvalidDate { .. } => "Invalid Date",
            Error::InvalidNumber { .. } => "Invalid Number",
            Error::MissingValue { .. } => "Missing Value",
            Error::InvalidInput(_) => "Invalid Input",
            Error::InvalidArgument { .. } => "Invalid Argument",

            Error::NoProjectData { .. } => "No Data For Project",
            Error::MixedProjects { .. } => "Mixed Project Series",
            Error::InvalidEngagement { .. } => "Invalid Engagement Value",

            Error::EmptyWindow { .. } => "Empty Comparison Window",
            Error::DegenerateScale { .. } => "Degenerate Rescale",

            Error::Config(_) => "Configuration Error",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Remediation hint.
    pub remediation: String,

    /// Additional structured context (e.g., project id, row).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::FileNotFound { path } => {
                context.insert("path".to_string(), serde_json::json!(path));
            }
            Error::MissingColumn { column } | Error::DuplicateColumn { column } => {
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::InvalidDate { row, value } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::InvalidNumber { row, column, value } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("column".to_string(), serde_json::json!(column));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::MissingValue { row, column } => {
                context.insert("row".to_string(), serde_json::json!(row));
                context.insert("column".to_string(), serde_json::json!(column));
            }
            Error::InvalidArgument { name, value } => {
                context.insert("name".to_string(), serde_json::json!(name));
                context.insert("value".to_string(), serde_json::json!(value));
            }
            Error::NoProjectData { project_id } => {
                context.insert("project_id".to_string(), serde_json::json!(project_id));
            }
            Error::EmptyWindow { date } => {
                context.insert("date".to_string(), serde_json::json!(date));
            }
            Error::DegenerateScale { max, replaced } => {
                context.insert("max_engagement".to_string(), serde_json::json!(max));
                context.insert("replaced".to_string(), serde_json::json!(replaced));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for a human reader: headline, reason, fix.
pub fn format_human(err: &Error) -> String {
    format!(
        "✗ {}\n  Reason: {}\n  Fix: {}",
        err.headline(),
        err,
        err.remediation()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_categories() {
        let cases: Vec<(Error, ErrorCategory)> = vec![
            (
                Error::MissingColumn {
                    column: "date".into(),
                },
                ErrorCategory::Input,
            ),
            (
                Error::NoProjectData {
                    project_id: ProjectId(4),
                },
                ErrorCategory::Data,
            ),
            (
                Error::DegenerateScale {
                    max: 0.0,
                    replaced: 0,
                },
                ErrorCategory::Analysis,
            ),
            (Error::Config("bad".into()), ErrorCategory::Config),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "x")),
                ErrorCategory::Io,
            ),
        ];
        for (err, category) in cases {
            assert_eq!(err.category(), category, "{}", err);
            let code = err.code();
            let expected_range = match category {
                ErrorCategory::Input => 10..20,
                ErrorCategory::Data => 20..30,
                ErrorCategory::Analysis => 30..40,
                ErrorCategory::Config => 40..50,
                ErrorCategory::Io => 60..70,
            };
            assert!(expected_range.contains(&code), "{} -> {}", err, code);
        }
    }

    #[test]
    fn structured_error_carries_context() {
        let err = Error::NoProjectData {
            project_id: ProjectId(42),
        };
        let structured = StructuredError::from(&err);
        assert_eq!(structured.code, 20);
        assert_eq!(structured.category, ErrorCategory::Data);
        assert_eq!(structured.context["project_id"], serde_json::json!(42));
        assert!(structured.message.contains("42"));

        let json = structured.to_json();
        assert!(json.contains("\"category\":\"data\""));
    }

    #[test]
    fn structured_error_with_context() {
        let err = Error::Config("x".into());
        let structured = StructuredError::from(&err).with_context("path", "/tmp/adjust.json");
        assert_eq!(structured.context["path"], serde_json::json!("/tmp/adjust.json"));
    }

    #[test]
    fn human_format_has_headline_and_fix() {
        let err = Error::InvalidDate {
            row: 3,
            value: "soon".into(),
        };
        let text = format_human(&err);
        assert!(text.starts_with("✗ Invalid Date"));
        assert!(text.contains("row 3"));
        assert!(text.contains("Fix:"));
    }

    #[test]
    fn io_error_converts() {
        fn read() -> Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"))?;
            Ok(())
        }
        assert_eq!(read().unwrap_err().code(), 60);
    }
}

//! Engagement table storage.
//!
//! This crate provides:
//! - Column layout and header normalization for engagement CSVs
//! - Tolerant date parsing and ISO-8601 formatting
//! - An Arrow-backed CSV loader that yields per-project series
//! - An Arrow-backed CSV writer with atomic replacement

pub mod dates;
pub mod reader;
pub mod schema;
pub mod writer;

pub use dates::{format_iso_date, parse_date};
pub use reader::{load_table, EngagementTable, ProjectOverview};
pub use schema::{normalize_column_name, TableLayout, REQUIRED_COLUMNS};
pub use writer::{output_file_name, write_series};

use thiserror::Error;

/// Errors from table load/write operations.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Data(#[from] oa_common::Error),
}

impl From<TableError> for oa_common::Error {
    fn from(err: TableError) -> Self {
        match err {
            TableError::Io(e) => oa_common::Error::Io(e),
            TableError::Arrow(e) => oa_common::Error::InvalidInput(e.to_string()),
            TableError::Data(e) => e,
        }
    }
}

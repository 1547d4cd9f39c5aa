//! Outlier adjustment common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the workspace:
//! - Project identity and dated engagement records
//! - The per-project series that the adjustment pipeline operates on
//! - Common error types
//! - Output format specifications

pub mod error;
pub mod id;
pub mod output;
pub mod record;

pub use error::{format_human, Error, ErrorCategory, Result, StructuredError};
pub use id::ProjectId;
pub use output::OutputFormat;
pub use record::{ProjectSeries, Record};

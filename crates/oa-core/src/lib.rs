//! Outlier Adjustment Core Library
//!
//! This library provides the core functionality for engagement outlier
//! adjustment:
//! - The detection and local re-evaluation algorithm
//! - The run pipeline with pluggable source, sink and clock
//! - Exit codes for CLI operations
//! - Configuration loading and validation
//! - Structured logging
//!
//! The binary entry point is in `main.rs`.

pub mod adjust;
pub mod clock;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod pipeline;
pub mod report;

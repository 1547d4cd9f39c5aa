//! Exit codes for the oa-core CLI.
//!
//! Exit codes communicate the run outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-1: Success/operational outcomes
//! - 10-19: User, input and environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use oa_common::{Error, ErrorCategory};

/// Exit codes for oa-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Success / Operational Outcomes (0-1)
    // ========================================================================
    /// Run complete: adjusted series written, or no outliers to adjust
    Clean = 0,

    /// Adjustment computed but not written (--dry-run)
    DryRun = 1,

    // ========================================================================
    // User / Input Errors (10-19)
    // ========================================================================
    /// Invalid arguments
    ArgsError = 10,

    /// Input file missing, unreadable or malformed
    InputError = 11,

    /// Requested project has no rows in the input
    NoProjectData = 12,

    /// Configuration file invalid
    ConfigError = 13,

    /// Adjustment undefined for this data (empty window under `fail`,
    /// zero maximum on rescale)
    AnalysisError = 14,

    /// Filesystem failure outside the input file (disk full, permission
    /// denied on the output directory)
    IoError = 15,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success (codes 0-1).
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::DryRun)
    }

    /// Check if this exit code is a user/input error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        let code = self as i32;
        code >= 20
    }

    /// Check if this exit code indicates any error requiring attention.
    pub fn is_error(self) -> bool {
        (self as i32) >= 10
    }

    /// Get the code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::DryRun => "OK_DRY_RUN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::NoProjectData => "ERR_NO_PROJECT_DATA",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::AnalysisError => "ERR_ANALYSIS",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Map a domain error to the exit code reported for it.
    pub fn for_error(err: &Error) -> ExitCode {
        match err {
            Error::NoProjectData { .. } => ExitCode::NoProjectData,
            Error::InvalidArgument { .. } => ExitCode::ArgsError,
            Error::MixedProjects { .. } | Error::Json(_) => ExitCode::InternalError,
            _ => match err.category() {
                ErrorCategory::Input | ErrorCategory::Data => ExitCode::InputError,
                ErrorCategory::Analysis => ExitCode::AnalysisError,
                ErrorCategory::Config => ExitCode::ConfigError,
                ErrorCategory::Io => ExitCode::IoError,
            },
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

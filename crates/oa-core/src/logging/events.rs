//! Stages, event names and correlation context for structured logs.

use oa_common::ProjectId;
use serde::{Deserialize, Serialize};

/// Stages of an adjustment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Reading the input table and isolating the project.
    Load,
    /// Global threshold and outlier selection.
    Detect,
    /// Local window re-evaluation of each outlier.
    Evaluate,
    /// Relative engagement recomputation.
    Rescale,
    /// Writing the adjusted table.
    Persist,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Load => "load",
            Stage::Detect => "detect",
            Stage::Evaluate => "evaluate",
            Stage::Rescale => "rescale",
            Stage::Persist => "persist",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Run lifecycle
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";
    pub const RUN_FAILED: &str = "run.failed";

    // Config
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";

    // Load stage
    pub const LOAD_FINISHED: &str = "load.finished";

    // Detect stage
    pub const DETECT_THRESHOLD: &str = "detect.threshold";
    pub const DETECT_FINISHED: &str = "detect.finished";
    pub const DETECT_NONE: &str = "detect.none";

    // Evaluate stage
    pub const EVALUATE_REPLACED: &str = "evaluate.replaced";
    pub const EVALUATE_UNCHANGED: &str = "evaluate.unchanged";
    pub const EVALUATE_EMPTY_WINDOW: &str = "evaluate.empty_window";

    // Rescale / persist
    pub const RESCALE_FINISHED: &str = "rescale.finished";
    pub const PERSIST_FINISHED: &str = "persist.finished";
    pub const PERSIST_SKIPPED: &str = "persist.skipped";
}

/// Correlation fields stamped on every event of a run.
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    /// Host identifier.
    pub host_id: String,
    /// Project under adjustment, once known.
    pub project_id: Option<ProjectId>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
            project_id: None,
        }
    }

    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Project id as a log field value (`-1` when unset).
    pub fn project_field(&self) -> i64 {
        self.project_id.map(|p| p.0).unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            Stage::Init,
            Stage::Load,
            Stage::Detect,
            Stage::Evaluate,
            Stage::Rescale,
            Stage::Persist,
        ] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn test_log_context() {
        let ctx = LogContext::new("run-abc", "host-xyz");
        assert_eq!(ctx.project_field(), -1);
        let ctx = ctx.with_project(ProjectId(17));
        assert_eq!(ctx.run_id, "run-abc");
        assert_eq!(ctx.project_field(), 17);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(event_names::RUN_STARTED, "run.started");
        assert_eq!(event_names::EVALUATE_REPLACED, "evaluate.replaced");
    }
}

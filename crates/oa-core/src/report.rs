//! Run report: what was detected, what was replaced, where it went.
//!
//! Rendered to stdout either as short human lines or as one JSON document.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::NaiveDate;
use oa_common::ProjectId;
use serde::{Deserialize, Serialize};

use crate::adjust::{AdjustParams, Decision, GlobalThreshold, LocalEvaluation};
use crate::exit_codes::ExitCode;

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing above the global threshold; no file written.
    NoOutliers,
    /// Adjusted series written.
    Persisted,
    /// Adjusted series computed, write skipped.
    DryRun,
}

impl RunStatus {
    pub fn exit_code(self) -> ExitCode {
        match self {
            RunStatus::NoOutliers | RunStatus::Persisted => ExitCode::Clean,
            RunStatus::DryRun => ExitCode::DryRun,
        }
    }
}

/// One globally flagged record and what happened to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub date: NaiveDate,
    pub original_value: f64,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// Number of comparison records in the window.
    pub window_records: usize,
    pub local_mean: Option<f64>,
    pub local_stdev: Option<f64>,
    pub local_threshold: Option<f64>,
    pub decision: Decision,
}

impl From<&LocalEvaluation> for OutlierReport {
    fn from(eval: &LocalEvaluation) -> Self {
        OutlierReport {
            date: eval.outlier.date,
            original_value: eval.outlier.value,
            window_start: eval.window.start,
            window_end: eval.window.end,
            window_records: eval.local.map(|s| s.count).unwrap_or(0),
            local_mean: eval.local.map(|s| s.mean),
            local_stdev: eval.local.map(|s| s.stdev),
            local_threshold: eval.local_threshold,
            decision: eval.decision,
        }
    }
}

impl OutlierReport {
    /// One console line for this outlier.
    pub fn human_line(&self) -> String {
        match self.decision {
            Decision::Replaced { new_value } => format!(
                "NEW VALUE: {:.2} | {} was {:.2}, above local threshold {:.2}; new value assigned.",
                new_value,
                self.date,
                self.original_value,
                self.local_threshold.unwrap_or(f64::NAN),
            ),
            Decision::Unchanged => format!(
                "NO NEW VALUE | {} ({:.2}) is an outlier vs. overall data but within local threshold {:.2}; no new value assigned.",
                self.date,
                self.original_value,
                self.local_threshold.unwrap_or(f64::NAN),
            ),
            Decision::SkippedEmptyWindow => format!(
                "SKIPPED | {} ({:.2}) has no other records between {} and {}; no new value assigned.",
                self.date, self.original_value, self.window_start, self.window_end,
            ),
        }
    }
}

/// Summary of one `adjust` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub project_id: ProjectId,
    pub run_date: NaiveDate,
    pub status: RunStatus,
    /// Records in the project series.
    pub records: usize,
    pub params: AdjustParams,
    pub global_threshold: GlobalThreshold,
    pub outliers: Vec<OutlierReport>,
    pub replaced: usize,
    /// Maximum `total_engagement` used for rescale (absent with no outliers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_engagement: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl RunReport {
    pub fn exit_code(&self) -> ExitCode {
        self.status.exit_code()
    }

    /// Final status line.
    pub fn status_line(&self) -> String {
        match self.status {
            RunStatus::NoOutliers => "No outliers detected!".to_string(),
            RunStatus::Persisted => "Outliers replaced. Execution complete!".to_string(),
            RunStatus::DryRun => format!(
                "Dry run: {} of {} outliers would be replaced. Nothing written.",
                self.replaced,
                self.outliers.len()
            ),
        }
    }

    /// Console rendering: one line per outlier, optional output path, then
    /// the status line.
    pub fn render_human(&self) -> String {
        let mut out = String::new();
        for outlier in &self.outliers {
            let _ = writeln!(out, "{}", outlier.human_line());
        }
        if let Some(path) = &self.output_path {
            let _ = writeln!(out, "Wrote {}", path.display());
        }
        let _ = writeln!(out, "{}", self.status_line());
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::{Outlier, Window};
    use oa_math::Summary;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn eval(decision: Decision, local: Option<Summary>) -> LocalEvaluation {
        LocalEvaluation {
            outlier: Outlier {
                index: 4,
                date: d(2021, 7, 20),
                value: 10_000.0,
            },
            window: Window {
                start: d(2021, 1, 20),
                end: d(2022, 1, 20),
            },
            local,
            local_threshold: local.map(|s| s.threshold(4.0)),
            decision,
        }
    }

    fn report(status: RunStatus, evals: &[LocalEvaluation]) -> RunReport {
        let summary = Summary {
            count: 21,
            mean: 500.0,
            stdev: 2000.0,
        };
        RunReport {
            run_id: "run-test".to_string(),
            project_id: ProjectId(7),
            run_date: d(2024, 3, 5),
            status,
            records: 21,
            params: AdjustParams::default(),
            global_threshold: GlobalThreshold {
                summary,
                sigmas: 4.0,
                value: summary.threshold(4.0),
            },
            outliers: evals.iter().map(OutlierReport::from).collect(),
            replaced: evals.iter().filter(|e| e.decision.is_replaced()).count(),
            max_engagement: None,
            output_path: None,
        }
    }

    #[test]
    fn outlier_report_copies_local_stats() {
        let local = Summary {
            count: 18,
            mean: 100.0,
            stdev: 3.0,
        };
        let r = OutlierReport::from(&eval(Decision::Replaced { new_value: 103.0 }, Some(local)));
        assert_eq!(r.window_records, 18);
        assert_eq!(r.local_mean, Some(100.0));
        assert_eq!(r.local_threshold, Some(112.0));
        assert!(r.human_line().starts_with("NEW VALUE: 103.00"));
        assert!(r.human_line().ends_with("new value assigned."));
    }

    #[test]
    fn unchanged_and_skipped_lines() {
        let local = Summary {
            count: 10,
            mean: 5_000.0,
            stdev: 2_000.0,
        };
        let r = OutlierReport::from(&eval(Decision::Unchanged, Some(local)));
        assert!(r.human_line().starts_with("NO NEW VALUE"));
        assert!(r.human_line().contains("no new value assigned"));

        let r = OutlierReport::from(&eval(Decision::SkippedEmptyWindow, None));
        assert_eq!(r.window_records, 0);
        assert!(r.human_line().starts_with("SKIPPED"));
        assert!(r.human_line().contains("2021-01-20"));
    }

    #[test]
    fn status_lines_and_exit_codes() {
        let r = report(RunStatus::NoOutliers, &[]);
        assert_eq!(r.render_human(), "No outliers detected!\n");
        assert_eq!(r.exit_code(), ExitCode::Clean);

        let mut r = report(
            RunStatus::Persisted,
            &[eval(Decision::Replaced { new_value: 1.0 }, None)],
        );
        r.output_path = Some(PathBuf::from("out/x.csv"));
        let text = r.render_human();
        assert!(text.contains("Wrote out/x.csv"));
        assert!(text.ends_with("Outliers replaced. Execution complete!\n"));
        assert_eq!(r.exit_code(), ExitCode::Clean);

        let r = report(RunStatus::DryRun, &[eval(Decision::Unchanged, None)]);
        assert!(r.status_line().contains("0 of 1"));
        assert_eq!(r.exit_code(), ExitCode::DryRun);
    }

    #[test]
    fn json_shape() {
        let r = report(
            RunStatus::Persisted,
            &[eval(Decision::Replaced { new_value: 1.5 }, None)],
        );
        let value: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();
        assert_eq!(value["status"], "persisted");
        assert_eq!(value["project_id"], 7);
        assert_eq!(value["run_date"], "2024-03-05");
        assert_eq!(value["outliers"][0]["decision"]["kind"], "replaced");
        assert_eq!(value["outliers"][0]["decision"]["new_value"], 1.5);
        assert!(value.get("output_path").is_none());
    }
}

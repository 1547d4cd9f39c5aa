//! Adjustment run: load → detect → evaluate → rescale → persist.
//!
//! Input and output sit behind [`SeriesSource`] and [`SeriesSink`], the run
//! date behind [`Clock`], so the whole run can execute in memory.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use oa_common::{ProjectId, ProjectSeries, Result};
use oa_table::{load_table, output_file_name, write_series, EngagementTable, TableLayout};
use tracing::field::{debug, display};

use crate::adjust::{adjust_series, AdjustParams, Adjustment, Decision, LocalEvaluation};
use crate::clock::Clock;
use crate::log_event;
use crate::logging::{event_names, LogContext, Stage};
use crate::report::{OutlierReport, RunReport, RunStatus};

/// Supplies the series for a project.
pub trait SeriesSource {
    fn load_series(&self, project_id: ProjectId) -> Result<ProjectSeries>;
}

/// Receives the adjusted series.
pub trait SeriesSink {
    /// Persist `series`; returns where it went.
    fn persist(&mut self, series: &ProjectSeries, run_date: NaiveDate) -> Result<PathBuf>;
}

/// Source backed by an engagement CSV loaded up front.
#[derive(Debug, Clone)]
pub struct CsvSource {
    table: EngagementTable,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(CsvSource {
            table: load_table(path)?,
        })
    }

    pub fn table(&self) -> &EngagementTable {
        &self.table
    }

    pub fn layout(&self) -> &TableLayout {
        self.table.layout()
    }
}

impl SeriesSource for CsvSource {
    fn load_series(&self, project_id: ProjectId) -> Result<ProjectSeries> {
        self.table.project_series(project_id)
    }
}

/// Sink that writes `outliers_adjusted_project_<id>_<DD-MM-YYYY>.csv` into
/// a directory, keeping the input's column layout.
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
    layout: TableLayout,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>, layout: TableLayout) -> Self {
        CsvSink {
            output_dir: output_dir.into(),
            layout,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl SeriesSink for CsvSink {
    fn persist(&mut self, series: &ProjectSeries, run_date: NaiveDate) -> Result<PathBuf> {
        let name = output_file_name(series.project_id(), run_date);
        let path = self.output_dir.join(name);
        Ok(write_series(&path, &self.layout, series)?)
    }
}

/// What to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunRequest {
    pub project_id: ProjectId,
    pub params: AdjustParams,
    /// Compute everything but skip the sink.
    pub dry_run: bool,
}

impl RunRequest {
    pub fn new(project_id: ProjectId, params: AdjustParams) -> Self {
        RunRequest {
            project_id,
            params,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Execute one adjustment run.
///
/// Any error aborts the run before the sink is touched, so a failed run
/// never produces output.
pub fn run(
    source: &dyn SeriesSource,
    sink: &mut dyn SeriesSink,
    clock: &dyn Clock,
    request: &RunRequest,
    ctx: &LogContext,
) -> Result<RunReport> {
    let ctx = ctx.clone().with_project(request.project_id);
    let params = &request.params;
    log_event!(
        ctx,
        INFO,
        event_names::RUN_STARTED,
        Stage::Init,
        "adjustment run started",
        window_months = params.window_months,
        dry_run = request.dry_run
    );

    let result = run_stages(source, sink, clock, request, &ctx);
    match &result {
        Ok(report) => log_event!(
            ctx,
            INFO,
            event_names::RUN_FINISHED,
            Stage::Persist,
            "adjustment run finished",
            status = debug(report.status),
            replaced = report.replaced
        ),
        Err(err) => log_event!(
            ctx,
            ERROR,
            event_names::RUN_FAILED,
            Stage::Init,
            "adjustment run failed",
            code = err.code(),
            error = display(err)
        ),
    }
    result
}

fn run_stages(
    source: &dyn SeriesSource,
    sink: &mut dyn SeriesSink,
    clock: &dyn Clock,
    request: &RunRequest,
    ctx: &LogContext,
) -> Result<RunReport> {
    let params = &request.params;

    let original = source.load_series(request.project_id)?;
    let (first, last) = original.date_span();
    log_event!(
        ctx,
        INFO,
        event_names::LOAD_FINISHED,
        Stage::Load,
        "project series loaded",
        records = original.len(),
        first_date = display(first),
        last_date = display(last)
    );

    let adjustment = adjust_series(&original, params)?;
    let threshold = *adjustment.threshold();
    log_event!(
        ctx,
        DEBUG,
        event_names::DETECT_THRESHOLD,
        Stage::Detect,
        "global threshold computed",
        mean = threshold.summary.mean,
        stdev = threshold.summary.stdev,
        threshold = threshold.value
    );

    let run_date = clock.today();
    let mut report = RunReport {
        run_id: ctx.run_id.clone(),
        project_id: request.project_id,
        run_date,
        status: RunStatus::NoOutliers,
        records: original.len(),
        params: *params,
        global_threshold: threshold,
        outliers: Vec::new(),
        replaced: 0,
        max_engagement: None,
        output_path: None,
    };

    let (evaluations, adjusted, max) = match adjustment {
        Adjustment::NoOutliers { .. } => {
            log_event!(
                ctx,
                INFO,
                event_names::DETECT_NONE,
                Stage::Detect,
                "no outliers detected",
                threshold = threshold.value
            );
            return Ok(report);
        }
        Adjustment::Adjusted {
            evaluations,
            series,
            max_engagement,
            ..
        } => (evaluations, series, max_engagement),
    };
    log_event!(
        ctx,
        INFO,
        event_names::DETECT_FINISHED,
        Stage::Detect,
        "outliers selected",
        outliers = evaluations.len(),
        threshold = threshold.value
    );

    for eval in &evaluations {
        log_evaluation(ctx, eval);
    }
    log_event!(
        ctx,
        DEBUG,
        event_names::RESCALE_FINISHED,
        Stage::Rescale,
        "relative engagement recomputed",
        max_engagement = max
    );

    report.outliers = evaluations.iter().map(OutlierReport::from).collect();
    report.replaced = evaluations
        .iter()
        .filter(|e| e.decision.is_replaced())
        .count();
    report.max_engagement = Some(max);

    if request.dry_run {
        log_event!(
            ctx,
            INFO,
            event_names::PERSIST_SKIPPED,
            Stage::Persist,
            "dry run; adjusted series not written"
        );
        report.status = RunStatus::DryRun;
        return Ok(report);
    }

    let path = sink.persist(&adjusted, run_date)?;
    log_event!(
        ctx,
        INFO,
        event_names::PERSIST_FINISHED,
        Stage::Persist,
        "adjusted series written",
        path = display(path.display()),
        records = adjusted.len()
    );
    report.status = RunStatus::Persisted;
    report.output_path = Some(path);
    Ok(report)
}

fn log_evaluation(ctx: &LogContext, eval: &LocalEvaluation) {
    let outlier = &eval.outlier;
    match eval.decision {
        Decision::Replaced { new_value } => log_event!(
            ctx,
            INFO,
            event_names::EVALUATE_REPLACED,
            Stage::Evaluate,
            "outlier replaced",
            date = display(outlier.date),
            original = outlier.value,
            new_value = new_value
        ),
        Decision::Unchanged => log_event!(
            ctx,
            INFO,
            event_names::EVALUATE_UNCHANGED,
            Stage::Evaluate,
            "outlier within local variation",
            date = display(outlier.date),
            original = outlier.value,
            local_threshold = eval.local_threshold.unwrap_or(f64::NAN)
        ),
        Decision::SkippedEmptyWindow => log_event!(
            ctx,
            WARN,
            event_names::EVALUATE_EMPTY_WINDOW,
            Stage::Evaluate,
            "no comparison records in window; value kept",
            date = display(outlier.date),
            window_start = display(eval.window.start),
            window_end = display(eval.window.end)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adjust::EmptyWindowPolicy;
    use crate::clock::FixedClock;
    use chrono::Duration;
    use oa_common::{Error, Record};

    struct MemorySource {
        records: Vec<Record>,
    }

    impl SeriesSource for MemorySource {
        fn load_series(&self, project_id: ProjectId) -> Result<ProjectSeries> {
            let records = self
                .records
                .iter()
                .filter(|r| r.project_id == project_id)
                .cloned()
                .collect();
            ProjectSeries::new(project_id, records)
        }
    }

    #[derive(Default)]
    struct MemorySink {
        written: Vec<(ProjectSeries, NaiveDate)>,
    }

    impl SeriesSink for MemorySink {
        fn persist(&mut self, series: &ProjectSeries, run_date: NaiveDate) -> Result<PathBuf> {
            self.written.push((series.clone(), run_date));
            Ok(PathBuf::from(output_file_name(series.project_id(), run_date)))
        }
    }

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn ctx() -> LogContext {
        LogContext::new("run-test", "host-test")
    }

    /// Project 7: 20 records ≈100 every 20 days plus a 10,000 spike on day
    /// 205. Project 8: flat.
    fn source() -> MemorySource {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let noise = [
            -5.0, 3.0, -2.0, 4.0, 1.0, -4.0, 5.0, -1.0, 2.0, -3.0, 0.0, 4.0, -5.0, 3.0, -2.0, 1.0,
            -1.0, 5.0, -4.0, 2.0,
        ];
        let mut records: Vec<Record> = noise
            .iter()
            .enumerate()
            .map(|(i, n)| {
                Record::new(
                    ProjectId(7),
                    start + Duration::days(i as i64 * 20),
                    100.0 + n,
                    1.0,
                )
            })
            .collect();
        records.push(Record::new(
            ProjectId(7),
            start + Duration::days(205),
            10_000.0,
            100.0,
        ));
        for i in 0..10 {
            records.push(Record::new(
                ProjectId(8),
                start + Duration::weeks(i),
                25.0,
                100.0,
            ));
        }
        MemorySource { records }
    }

    #[test]
    fn isolated_spike_is_replaced_and_persisted() {
        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(7), AdjustParams::default());
        let report = run(&source(), &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap();

        assert_eq!(report.status, RunStatus::Persisted);
        assert_eq!(report.replaced, 1);
        assert_eq!(report.outliers.len(), 1);
        assert_eq!(
            report.output_path,
            Some(PathBuf::from("outliers_adjusted_project_7_05-03-2024.csv"))
        );

        let (written, date) = &sink.written[0];
        assert_eq!(*date, run_date());
        assert_eq!(written.len(), 21);
        let replaced = written
            .records()
            .iter()
            .find(|r| r.date == report.outliers[0].date)
            .unwrap();
        assert!(replaced.total_engagement < 115.0);

        let max_rel = written
            .records()
            .iter()
            .map(|r| r.relative_engagement)
            .fold(f64::MIN, f64::max);
        assert!((max_rel - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_project_fails_without_output() {
        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(99), AdjustParams::default());
        let err = run(&source(), &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap_err();
        assert!(matches!(err, Error::NoProjectData { project_id } if project_id == ProjectId(99)));
        assert!(sink.written.is_empty());
    }

    #[test]
    fn no_outliers_writes_nothing() {
        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(8), AdjustParams::default());
        let report = run(&source(), &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap();
        assert_eq!(report.status, RunStatus::NoOutliers);
        assert!(report.outliers.is_empty());
        assert!(report.output_path.is_none());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn dry_run_skips_sink() {
        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(7), AdjustParams::default()).with_dry_run(true);
        let report = run(&source(), &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap();
        assert_eq!(report.status, RunStatus::DryRun);
        assert_eq!(report.replaced, 1);
        assert!(report.max_engagement.is_some());
        assert!(sink.written.is_empty());
    }

    #[test]
    fn failed_evaluation_writes_nothing() {
        // A lone spike years after the rest has an empty window.
        let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
        let mut records: Vec<Record> = (0..30)
            .map(|i| Record::new(ProjectId(1), start + Duration::days(i), 10.0, 0.0))
            .collect();
        records.push(Record::new(
            ProjectId(1),
            start + Duration::days(2000),
            5_000.0,
            0.0,
        ));
        let source = MemorySource { records };
        let params = AdjustParams::default().with_empty_window(EmptyWindowPolicy::Fail);

        let mut sink = MemorySink::default();
        let err = run(
            &source,
            &mut sink,
            &FixedClock(run_date()),
            &RunRequest::new(ProjectId(1), params),
            &ctx(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::EmptyWindow { .. }));
        assert!(sink.written.is_empty());

        // Default policy carries on and still writes the rescaled series.
        let report = run(
            &source,
            &mut sink,
            &FixedClock(run_date()),
            &RunRequest::new(ProjectId(1), AdjustParams::default()),
            &ctx(),
        )
        .unwrap();
        assert_eq!(report.status, RunStatus::Persisted);
        assert_eq!(report.replaced, 0);
        assert_eq!(sink.written.len(), 1);
    }

    #[test]
    fn elevated_neighbourhood_outlier_is_reported_but_kept() {
        // Quiet history, then a sustained burst. The burst's peak clears the
        // global cutoff but not the cutoff of its own window.
        let start = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        let mut records: Vec<Record> = (0..200)
            .map(|i| Record::new(ProjectId(3), start + Duration::weeks(i), 10.0, 1.0))
            .collect();
        let burst_start = start + Duration::weeks(200);
        let burst = [400.0, 600.0, 800.0, 500.0, 700.0, 450.0, 650.0, 550.0];
        for (i, v) in burst.iter().enumerate() {
            records.push(Record::new(
                ProjectId(3),
                burst_start + Duration::weeks(i as i64),
                *v,
                50.0,
            ));
        }
        let peak = burst_start + Duration::weeks(20);
        records.push(Record::new(ProjectId(3), peak, 900.0, 100.0));
        for i in 21..26 {
            records.push(Record::new(
                ProjectId(3),
                burst_start + Duration::weeks(i),
                600.0,
                66.0,
            ));
        }
        let source = MemorySource { records };

        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(3), AdjustParams::default());
        let report = run(&source, &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap();

        assert_eq!(report.status, RunStatus::Persisted);
        let flagged = report
            .outliers
            .iter()
            .find(|o| o.date == peak)
            .expect("peak is flagged globally");
        assert_eq!(flagged.decision, Decision::Unchanged);
        assert!(flagged.human_line().contains("no new value assigned"));

        let (written, _) = &sink.written[0];
        let kept = written.records().iter().find(|r| r.date == peak).unwrap();
        assert_eq!(kept.total_engagement, 900.0);
        assert_eq!(kept.relative_engagement, 100.0);
    }

    #[test]
    fn series_zeroed_by_adjustment_fails_without_output() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        let mut records: Vec<Record> = (0..20)
            .map(|i| Record::new(ProjectId(5), start + Duration::weeks(i), 0.0, 0.0))
            .collect();
        records.push(Record::new(
            ProjectId(5),
            start + Duration::weeks(20),
            50.0,
            100.0,
        ));
        let source = MemorySource { records };

        let mut sink = MemorySink::default();
        let request = RunRequest::new(ProjectId(5), AdjustParams::default());
        let err = run(&source, &mut sink, &FixedClock(run_date()), &request, &ctx()).unwrap_err();
        assert!(matches!(err, Error::DegenerateScale { replaced: 1, .. }));
        assert!(err.to_string().contains("after 1 replacement"));
        assert!(sink.written.is_empty());
    }
}

//! Outlier Adjust Core - engagement outlier detection and adjustment
//!
//! The main entry point for oa-core, handling:
//! - Per-project outlier detection and local re-evaluation (`adjust`)
//! - Input and configuration validation (`check`)
//! - Version reporting

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use oa_common::{format_human, Error, OutputFormat, ProjectId, StructuredError};
use oa_core::clock::{Clock, FixedClock, SystemClock};
use oa_core::config::{load_config, ConfigOptions, ResolvedConfig};
use oa_core::exit_codes::ExitCode;
use oa_core::log_event;
use oa_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use oa_core::pipeline::{run, CsvSink, CsvSource, RunRequest};
use oa_table::{format_iso_date, parse_date};

/// Outlier Adjust Core - replaces local engagement spikes in a project series
#[derive(Parser)]
#[command(name = "oa-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (adjust.json); overrides OUTLIER_ADJUST_CONFIG and XDG lookup
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Pin the run date used in output file names (any supported date format)
    #[arg(long, global = true, env = "OA_RUN_DATE", hide = true)]
    run_date: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect, re-evaluate and replace outliers for one project
    Adjust(AdjustArgs),

    /// Validate configuration and input, list projects present
    Check(CheckArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct AdjustArgs {
    /// Project to adjust
    project_id: ProjectId,

    /// Engagement CSV
    file_name: PathBuf,

    /// Half-width of the local window in months (default from config, 6)
    #[arg(long)]
    month_range: Option<u32>,

    /// Directory for the adjusted CSV
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Compute and report, but do not write the adjusted CSV
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Engagement CSV to validate
    file_name: PathBuf,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let cli_format = match cli.global.format {
        OutputFormat::Json => Some(LogFormat::Jsonl),
        OutputFormat::Human => None,
    };
    init_logging(&LogConfig::from_env(cli_level, cli_format));

    let exit_code = match &cli.command {
        Commands::Adjust(args) => run_adjust(&cli.global, args),
        Commands::Check(args) => run_check(&cli.global, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_adjust(global: &GlobalOpts, args: &AdjustArgs) -> ExitCode {
    let ctx = LogContext::new(generate_run_id(), get_host_id()).with_project(args.project_id);

    let clock = match run_clock(global) {
        Ok(clock) => clock,
        Err(err) => return report_error(global, &err),
    };

    let resolved = match resolve_config(global, &ctx) {
        Ok(resolved) => resolved,
        Err(err) => return report_error(global, &err),
    };
    let params = match resolved.config.to_params(args.month_range) {
        Ok(params) => params,
        Err(err) => return report_error(global, &err.into()),
    };

    let source = match CsvSource::open(&args.file_name) {
        Ok(source) => source,
        Err(err) => return report_error(global, &err),
    };
    let mut sink = CsvSink::new(&args.output_dir, source.layout().clone());
    let request = RunRequest::new(args.project_id, params).with_dry_run(args.dry_run);

    match run(&source, &mut sink, clock.as_ref(), &request, &ctx) {
        Ok(report) => {
            match global.format {
                OutputFormat::Human => print!("{}", report.render_human()),
                OutputFormat::Json => match report.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(err) => return report_error(global, &Error::Json(err)),
                },
            }
            report.exit_code()
        }
        Err(err) => report_error(global, &err),
    }
}

fn run_check(global: &GlobalOpts, args: &CheckArgs) -> ExitCode {
    let ctx = LogContext::new(generate_run_id(), get_host_id());

    let resolved = match resolve_config(global, &ctx) {
        Ok(resolved) => resolved,
        Err(err) => return report_error(global, &err),
    };
    let source = match CsvSource::open(&args.file_name) {
        Ok(source) => source,
        Err(err) => return report_error(global, &err),
    };
    let table = source.table();
    let projects = table.projects();

    match global.format {
        OutputFormat::Json => {
            let listing: Vec<serde_json::Value> = projects
                .iter()
                .map(|(id, o)| {
                    serde_json::json!({
                        "project_id": id,
                        "records": o.records,
                        "first_date": format_iso_date(o.first_date),
                        "last_date": format_iso_date(o.last_date),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "file": args.file_name,
                "records": table.len(),
                "columns": table.layout().columns(),
                "config_source": resolved.source,
                "config_path": resolved.path,
                "config": resolved.config,
                "projects": listing,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{}", json),
                Err(err) => return report_error(global, &Error::Json(err)),
            }
        }
        OutputFormat::Human => {
            println!(
                "{}: {} records, {} projects",
                args.file_name.display(),
                table.len(),
                projects.len()
            );
            match &resolved.path {
                Some(path) => println!("config: {} ({})", path.display(), resolved.source),
                None => println!("config: {}", resolved.source),
            }
            for (id, o) in &projects {
                println!(
                    "  project {:>6}  {:>6} records  {} .. {}",
                    id,
                    o.records,
                    format_iso_date(o.first_date),
                    format_iso_date(o.last_date)
                );
            }
        }
    }
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    match global.format {
        OutputFormat::Json => {
            let version_info = serde_json::json!({
                "oa_core_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            });
            println!("{}", version_info);
        }
        OutputFormat::Human => {
            println!("oa-core {}", env!("CARGO_PKG_VERSION"));
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn resolve_config(global: &GlobalOpts, ctx: &LogContext) -> Result<ResolvedConfig, Error> {
    let options = ConfigOptions {
        config_path: global.config.clone(),
        config_home: None,
    };
    let resolved = load_config(&options)?;
    match &resolved.path {
        Some(path) => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_LOADED,
            Stage::Init,
            "configuration loaded",
            path = tracing::field::display(path.display()),
            source = tracing::field::display(resolved.source)
        ),
        None => log_event!(
            ctx,
            DEBUG,
            event_names::CONFIG_DEFAULT_USED,
            Stage::Init,
            "no config file found; using defaults"
        ),
    }
    Ok(resolved)
}

fn run_clock(global: &GlobalOpts) -> Result<Box<dyn Clock>, Error> {
    let Some(raw) = &global.run_date else {
        return Ok(Box::new(SystemClock));
    };
    let date = parse_date(raw).ok_or_else(|| Error::InvalidArgument {
        name: "--run-date".to_string(),
        value: raw.clone(),
    })?;
    Ok(Box::new(FixedClock(date)))
}

fn report_error(global: &GlobalOpts, err: &Error) -> ExitCode {
    let code = ExitCode::for_error(err);
    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(err).with_context("exit_code", code.code_name());
            eprintln!("{}", structured.to_json());
        }
        OutputFormat::Human => eprintln!("{}", format_human(err)),
    }
    code
}

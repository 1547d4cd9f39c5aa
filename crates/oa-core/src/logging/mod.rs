//! Structured logging for oa-core.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSON lines for pipelines
//!
//! # Usage
//!
//! ```ignore
//! use oa_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! let ctx = LogContext::new(generate_run_id(), get_host_id());
//! oa_core::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "starting");
//! ```
//!
//! stdout is reserved for the run report; all log output goes to stderr.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Call once at startup. A second call is a no-op.
pub fn init_logging(config: &LogConfig) {
    let level: LevelFilter = config.level.into();
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(std::env::var("OA_LOG_FILTER").unwrap_or_default());

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init();
            } else {
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init();
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_writer(std::io::stderr);
            let _ = tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init();
        }
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    // Shorten to first 12 hex chars for readability
    format!("run-{}", &uuid.simple().to_string()[..12])
}

/// Get the host ID for logging.
///
/// Uses machine-id on Linux, otherwise the hostname, otherwise a random id.
pub fn get_host_id() -> String {
    if let Some(id) = std::fs::read_to_string("/etc/machine-id")
        .ok()
        .and_then(|raw| machine_host_id(&raw))
    {
        return id;
    }

    if let Ok(hostname) = std::env::var("HOSTNAME") {
        let hash = hash_string(&hostname);
        return format!("host-{}", &hash[..8]);
    }

    format!("host-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// `host-` plus the first 8 characters of a machine id, if it has that many.
fn machine_host_id(raw: &str) -> Option<String> {
    let short: String = raw.trim().chars().take(8).collect();
    (short.chars().count() == 8).then(|| format!("host-{short}"))
}

fn hash_string(s: &str) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Structured event logging with the run's correlation fields.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::DETECT_FINISHED, Stage::Detect, "outliers selected",
///     outliers = 3);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            event = $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            project_id = $ctx.project_field(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            event = $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            project_id = $ctx.project_field(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            event = $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            project_id = $ctx.project_field(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            event = $event,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            project_id = $ctx.project_field(),
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}

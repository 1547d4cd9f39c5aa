//! Configuration loading and validation for oa-core.
//!
//! This module handles:
//! - Loading the `adjust.json` tunables file
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (positive sigmas, ordered cutoffs)

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adjust::{
    AdjustParams, EmptyWindowPolicy, DEFAULT_RELATIVE_SCALE, DEFAULT_REPLACEMENT_SIGMAS,
    DEFAULT_THRESHOLD_SIGMAS, DEFAULT_WINDOW_MONTHS,
};

/// Environment variable holding an explicit config file path.
pub const ENV_CONFIG_PATH: &str = "OUTLIER_ADJUST_CONFIG";

/// XDG config directory name.
const CONFIG_DIR_NAME: &str = "outlier_adjust";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "adjust.json";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Semantic validation failed: {field}: {message}")]
    ValidationError { field: &'static str, message: String },
}

impl From<ConfigError> for oa_common::Error {
    fn from(err: ConfigError) -> Self {
        oa_common::Error::Config(err.to_string())
    }
}

/// Where the active configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// `--config` flag.
    CliArgument,
    /// `OUTLIER_ADJUST_CONFIG`.
    Environment,
    /// `$XDG_CONFIG_HOME/outlier_adjust/adjust.json`.
    XdgConfig,
    /// No file found.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Adjustment tunables as stored on disk. Every field is optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustConfig {
    /// σ multiplier for both the global and the local cutoff.
    pub threshold_sigmas: f64,
    /// σ multiplier for the replacement value.
    pub replacement_sigmas: f64,
    /// Default half-width of the local window, in months.
    pub window_months: u32,
    pub empty_window: EmptyWindowPolicy,
    /// Value assigned to the largest record after rescale.
    pub relative_scale: f64,
}

impl Default for AdjustConfig {
    fn default() -> Self {
        AdjustConfig {
            threshold_sigmas: DEFAULT_THRESHOLD_SIGMAS,
            replacement_sigmas: DEFAULT_REPLACEMENT_SIGMAS,
            window_months: DEFAULT_WINDOW_MONTHS,
            empty_window: EmptyWindowPolicy::default(),
            relative_scale: DEFAULT_RELATIVE_SCALE,
        }
    }
}

impl AdjustConfig {
    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("threshold_sigmas", self.threshold_sigmas)?;
        check_positive("replacement_sigmas", self.replacement_sigmas)?;
        check_positive("relative_scale", self.relative_scale)?;
        if self.replacement_sigmas >= self.threshold_sigmas {
            return Err(ConfigError::ValidationError {
                field: "replacement_sigmas",
                message: format!(
                    "must be below threshold_sigmas ({} >= {})",
                    self.replacement_sigmas, self.threshold_sigmas
                ),
            });
        }
        check_window("window_months", self.window_months)?;
        Ok(())
    }

    /// Algorithm parameters, with an optional `--month-range` override.
    pub fn to_params(&self, month_override: Option<u32>) -> Result<AdjustParams, ConfigError> {
        let window_months = match month_override {
            Some(months) => {
                check_window("month_range", months)?;
                months
            }
            None => self.window_months,
        };
        Ok(AdjustParams {
            threshold_sigmas: self.threshold_sigmas,
            replacement_sigmas: self.replacement_sigmas,
            window_months,
            empty_window: self.empty_window,
            relative_scale: self.relative_scale,
        })
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            field,
            message: format!("must be a finite positive number, got {}", value),
        })
    }
}

fn check_window(field: &'static str, months: u32) -> Result<(), ConfigError> {
    if months >= 1 {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            field,
            message: "must be at least 1 month".to_string(),
        })
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
    /// Override for the XDG config home, mainly for tests.
    pub config_home: Option<PathBuf>,
}

/// Loaded configuration with provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub config: AdjustConfig,
    /// File the config was read from (None when using defaults).
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit `--config` path (must exist)
/// 2. `OUTLIER_ADJUST_CONFIG` (must exist)
/// 3. `$XDG_CONFIG_HOME/outlier_adjust/adjust.json` (used if present)
/// 4. Built-in defaults
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let env_path = std::env::var_os(ENV_CONFIG_PATH)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    load_config_with(options, env_path)
}

/// [`load_config`] with the environment value supplied by the caller.
pub fn load_config_with(
    options: &ConfigOptions,
    env_path: Option<PathBuf>,
) -> Result<ResolvedConfig, ConfigError> {
    let located = if let Some(path) = &options.config_path {
        Some((require_file(path)?, ConfigSource::CliArgument))
    } else if let Some(path) = env_path {
        Some((require_file(&path)?, ConfigSource::Environment))
    } else {
        xdg_config_file(options.config_home.as_deref())
            .filter(|p| p.is_file())
            .map(|p| (p, ConfigSource::XdgConfig))
    };

    let Some((path, source)) = located else {
        return Ok(ResolvedConfig {
            config: AdjustConfig::default(),
            path: None,
            source: ConfigSource::BuiltinDefault,
        });
    };

    let config = load_config_file(&path)?;
    config.validate()?;
    Ok(ResolvedConfig {
        config,
        path: Some(path),
        source,
    })
}

/// Read and parse a single config file without validating it.
pub fn load_config_file(path: &Path) -> Result<AdjustConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

fn require_file(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        Ok(path.to_path_buf())
    } else {
        Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// `<config home>/outlier_adjust/adjust.json`.
///
/// Honors `XDG_CONFIG_HOME`, then falls back to the platform config dir.
pub fn xdg_config_file(config_home: Option<&Path>) -> Option<PathBuf> {
    let home = match config_home {
        Some(dir) => Some(dir.to_path_buf()),
        None => std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::config_dir),
    };
    home.map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

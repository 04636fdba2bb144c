//! Executor configuration.
//!
//! Per-run parameters come from the experiment definition (see
//! [`crate::experiment`]); this module covers the process-wide settings of
//! the executor, read from an optional YAML file:
//!
//! ```yaml
//! output_dir: results
//! workers: 0          # 0 = available parallelism
//! base_seed: 42
//! snapshot_every: 0   # 0 = snapshot only on cancel
//! log_level: info
//! ```
//!
//! Missing keys take their defaults. `CULTURESIM_OUTPUT_DIR` and
//! `CULTURESIM_WORKERS` override the file.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held an unusable value.
    #[error("invalid value `{value}` for {variable}")]
    Env {
        /// Name of the environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Process-wide executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecutorConfig {
    /// Directory receiving run logs, snapshots, and the aggregate file.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Concurrent runs; 0 means one per available core.
    #[serde(default)]
    pub workers: usize,

    /// Seed base for runs without random initialization
    /// (`seed = base_seed + run_id`).
    #[serde(default = "default_base_seed")]
    pub base_seed: u64,

    /// Persist a snapshot every N checkpoints; 0 snapshots only on cancel.
    #[serde(default)]
    pub snapshot_every: u64,

    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            workers: 0,
            base_seed: default_base_seed(),
            snapshot_every: 0,
            log_level: default_log_level(),
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Env`] for an unparsable override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string and apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] for an unparsable override.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `CULTURESIM_OUTPUT_DIR` and `CULTURESIM_WORKERS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Env`] if `CULTURESIM_WORKERS` is not a
    /// non-negative integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("CULTURESIM_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CULTURESIM_WORKERS") {
            self.workers = val.trim().parse().map_err(|_e: std::num::ParseIntError| {
                ConfigError::Env {
                    variable: "CULTURESIM_WORKERS",
                    value: val.clone(),
                }
            })?;
        }
        Ok(())
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
    }

    /// Directory of per-run checkpoint logs.
    pub fn runs_dir(&self) -> PathBuf {
        self.output_dir.join("runs")
    }

    /// Directory of run snapshots.
    pub fn snapshots_dir(&self) -> PathBuf {
        self.output_dir.join("snapshots")
    }

    /// Path of the aggregate results file.
    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join("results.csv")
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

const fn default_base_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_owned()
}

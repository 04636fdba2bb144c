//! Error types for the culturesim binary.
//!
//! [`EngineError`] wraps every failure that can stop the process before or
//! while the executor runs. Per-run faults are not errors here; they are
//! reported in the executor's run reports.

use std::path::PathBuf;
use std::process::ExitCode;

/// Top-level error for the culturesim binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The executor configuration could not be loaded.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: culturesim_core::ConfigError,
    },

    /// The experiment definition could not be loaded.
    #[error("experiment error: {source}")]
    Experiment {
        /// The underlying experiment error.
        #[from]
        source: culturesim_core::ExperimentError,
    },

    /// An `--events` argument is malformed.
    #[error("event error: {source}")]
    Event {
        /// The underlying parse error.
        #[from]
        source: culturesim_events::EventError,
    },

    /// A path given on the command line does not exist.
    #[error("{} does not exist", path.display())]
    MissingPath {
        /// The missing path.
        path: PathBuf,
    },

    /// The executor could not start or resume.
    #[error("executor error: {source}")]
    Executor {
        /// The underlying executor error.
        #[from]
        source: culturesim_core::ExecutorError,
    },
}

impl EngineError {
    /// Process exit code for this error: 2 for bad input, 1 otherwise.
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config { .. }
            | Self::Experiment { .. }
            | Self::Event { .. }
            | Self::MissingPath { .. } => ExitCode::from(2),
            Self::Executor { source } => match source {
                culturesim_core::ExecutorError::Snapshot { .. }
                | culturesim_core::ExecutorError::Run { .. } => ExitCode::from(2),
                culturesim_core::ExecutorError::Io { .. }
                | culturesim_core::ExecutorError::Checkpoint { .. } => ExitCode::FAILURE,
            },
        }
    }
}

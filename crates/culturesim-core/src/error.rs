//! Error types for run execution and the executor.
//!
//! Module-specific failures ([`ConfigError`](crate::config::ConfigError),
//! [`CheckpointError`], [`SnapshotError`],
//! [`ExperimentError`](crate::experiment::ExperimentError)) live next to the
//! code that raises them; this module holds the errors that compose them.

use std::path::PathBuf;

use culturesim_agents::ModelError;
use culturesim_events::EventError;
use culturesim_types::ConfigurationError;
use culturesim_world::WorldError;

use crate::checkpoint::CheckpointError;
use crate::snapshot::SnapshotError;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The run's parameters are out of range.
    #[error("invalid configuration: {source}")]
    Config {
        /// The validation failure.
        #[from]
        source: ConfigurationError,
    },

    /// An interaction rule failed.
    #[error("interaction failed: {source}")]
    Model {
        /// The underlying rule error.
        #[from]
        source: ModelError,
    },

    /// An event could not be applied.
    #[error("event {event} failed: {source}")]
    Event {
        /// The event, in mini-language form.
        event: String,
        /// The underlying event error.
        source: EventError,
    },

    /// Restored state is inconsistent.
    #[error("world state: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// A snapshot could not be written.
    #[error("snapshot: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: SnapshotError,
    },
}

/// Errors that stop the executor before any run starts.
///
/// Faults inside a run never surface here; they are reported per run in
/// [`RunReport`](crate::executor::RunReport).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// An output directory could not be created.
    #[error("cannot create {}: {source}", path.display())]
    Io {
        /// Directory being created.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The aggregate results file could not be read.
    #[error("results file: {source}")]
    Checkpoint {
        /// The underlying checkpoint error.
        #[from]
        source: CheckpointError,
    },

    /// A snapshot could not be loaded for resumption.
    #[error("resume: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: SnapshotError,
    },

    /// A loaded snapshot does not describe a runnable state.
    #[error("resume: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: RunError,
    },
}

//! Run lifecycle and orchestration for culturesim.
//!
//! This crate turns per-run [`Configuration`]s into executed simulations:
//! it drives the checkpoint loop of a single run, schedules many runs on a
//! bounded worker pool, and owns every file the simulation writes.
//!
//! # Modules
//!
//! - [`checkpoint`] -- [`CheckpointSink`], per-run logs and the aggregate file
//! - [`config`] -- [`ExecutorConfig`] loaded from YAML and the environment
//! - [`control`] -- [`RunControl`], the suspend/resume/cancel play state
//! - [`error`] -- [`RunError`] and [`ExecutorError`]
//! - [`executor`] -- [`RunExecutor`], the parallel run pool
//! - [`experiment`] -- The tabular experiment definition and run planning
//! - [`render`] -- [`RenderSink`] hook called at checkpoints
//! - [`run`] -- [`SimulationRun`] and its [`RunStatus`]
//! - [`snapshot`] -- [`RunSnapshot`] save and load
//!
//! [`Configuration`]: culturesim_types::Configuration

pub mod checkpoint;
pub mod config;
pub mod control;
pub mod error;
pub mod executor;
pub mod experiment;
pub mod render;
pub mod run;
pub mod snapshot;

pub use checkpoint::{AggregateWriter, CheckpointError, CheckpointLog, CheckpointSink};
pub use config::{ConfigError, ExecutorConfig};
pub use control::{Checkpoint, PlayState, RunControl};
pub use error::{ExecutorError, RunError};
pub use executor::{RunExecutor, RunReport};
pub use experiment::{
    EXPERIMENT_COLUMNS, ExperimentError, PlannedRun, TaskGroup, load_experiment, parse_experiment,
    plan_runs,
};
pub use render::{NoOpRender, RenderSink};
pub use run::{RunStatus, SimulationRun};
pub use snapshot::{
    RunSnapshot, SNAPSHOT_VERSION, SnapshotError, discard_snapshot, list_snapshots, load_snapshot,
    save_snapshot, snapshot_path,
};

//! Parallel execution of many simulation runs.
//!
//! # Architecture
//!
//! ```text
//! run_all(runs)
//!   |-- register a RunControl per run (state follows the executor flags)
//!   |-- JoinSet task per run
//!   |     |-- wait for a worker permit (Semaphore, effective_workers)
//!   |     '-- spawn_blocking: SimulationRun::execute
//!   |           |-- CheckpointLog  <output>/runs/run-<id>.csv
//!   |           '-- snapshots      <output>/snapshots/run-<id>.json.gz
//!   '-- as each run finishes: update and rewrite <output>/results.csv
//! ```
//!
//! # Invariants
//!
//! - Runs share nothing; a fault or panic in one run is reported in its
//!   [`RunReport`] and never reaches its siblings. A panicking run still
//!   flushes its checkpoint log and reports the last row it recorded.
//! - [`RunExecutor::suspend_all`], [`RunExecutor::resume_all`] and
//!   [`RunExecutor::cancel_all`] are idempotent and may be called before
//!   any run is submitted; runs registered later start in the matching
//!   state.

use std::any::Any;
use std::collections::BTreeMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use culturesim_types::ResultRow;

use crate::checkpoint::{AggregateWriter, CheckpointError, CheckpointLog, CheckpointSink};
use crate::config::ExecutorConfig;
use crate::control::{Checkpoint, PlayState, RunControl};
use crate::error::ExecutorError;
use crate::render::{NoOpRender, RenderSink};
use crate::run::{RunStatus, SimulationRun};
use crate::snapshot::{discard_snapshot, list_snapshots, load_snapshot, snapshot_path};

/// Outcome of one run submitted to the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: u64,
    /// Final lifecycle status.
    pub status: RunStatus,
    /// Last row the run recorded, if any.
    pub last_row: Option<ResultRow>,
    /// Why the run failed, for [`RunStatus::Failed`].
    pub error: Option<String>,
}

/// Bounded worker pool for simulation runs.
#[derive(Debug)]
pub struct RunExecutor {
    config: ExecutorConfig,
    controls: Mutex<BTreeMap<u64, Arc<RunControl>>>,
    suspended: AtomicBool,
    canceled: AtomicBool,
}

impl RunExecutor {
    /// Executor writing below `config.output_dir`.
    pub const fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            controls: Mutex::new(BTreeMap::new()),
            suspended: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
        }
    }

    /// Executor settings.
    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Whether [`cancel_all`](Self::cancel_all) has been called.
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Block every run at its next checkpoint.
    pub fn suspend_all(&self) {
        let controls = self.controls();
        self.suspended.store(true, Ordering::SeqCst);
        for control in controls.values() {
            control.suspend();
        }
        let runs = controls.len();
        drop(controls);
        info!(runs, "all runs suspended");
    }

    /// Release every suspended run.
    pub fn resume_all(&self) {
        let controls = self.controls();
        self.suspended.store(false, Ordering::SeqCst);
        for control in controls.values() {
            control.resume();
        }
        let runs = controls.len();
        drop(controls);
        info!(runs, "all runs resumed");
    }

    /// Stop every run at its next checkpoint, including runs not yet
    /// started. Canceled runs leave a snapshot for later resumption.
    pub fn cancel_all(&self) {
        let controls = self.controls();
        self.canceled.store(true, Ordering::SeqCst);
        for control in controls.values() {
            control.cancel();
        }
        let runs = controls.len();
        drop(controls);
        info!(runs, "all runs canceled");
    }

    fn controls(&self) -> MutexGuard<'_, BTreeMap<u64, Arc<RunControl>>> {
        self.controls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, run_id: u64) -> Arc<RunControl> {
        let mut controls = self.controls();
        let initial = if self.canceled.load(Ordering::SeqCst) {
            PlayState::Canceled
        } else if self.suspended.load(Ordering::SeqCst) {
            PlayState::Suspended
        } else {
            PlayState::Running
        };
        let control = Arc::new(RunControl::new(initial));
        controls.insert(run_id, Arc::clone(&control));
        drop(controls);
        control
    }

    /// Rebuild every run that left a snapshot in the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError::Snapshot`] if the snapshot directory cannot
    /// be listed or a file cannot be read, and [`ExecutorError::Run`] if a
    /// snapshot holds inconsistent state.
    pub fn load_snapshots(&self) -> Result<Vec<SimulationRun>, ExecutorError> {
        let dir = self.config.snapshots_dir();
        let mut runs = Vec::new();
        for path in list_snapshots(&dir)? {
            let snapshot = load_snapshot(&path)?;
            runs.push(SimulationRun::from_snapshot(snapshot)?);
        }
        info!(dir = %dir.display(), runs = runs.len(), "snapshots loaded");
        Ok(runs)
    }

    /// Execute `runs` on the worker pool and wait for all of them.
    ///
    /// Reports are returned in run-id order. The aggregate results file is
    /// rewritten each time a run finishes.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutorError`] only for failures before any run starts:
    /// an output directory that cannot be created or an unreadable
    /// aggregate file.
    pub async fn run_all(&self, runs: Vec<SimulationRun>) -> Result<Vec<RunReport>, ExecutorError> {
        let runs_dir = self.config.runs_dir();
        let snapshots_dir = self.config.snapshots_dir();
        create_dir(&runs_dir)?;
        create_dir(&snapshots_dir)?;
        let mut aggregate = AggregateWriter::open(self.config.results_path())?;

        let workers = self.config.effective_workers();
        let permits = Arc::new(Semaphore::new(workers));
        info!(runs = runs.len(), workers, "executor started");

        let mut tasks = JoinSet::new();
        for run in runs {
            let run_id = run.id();
            let control = self.register(run_id);
            let run = run.with_snapshots(snapshots_dir.clone(), self.config.snapshot_every);
            let log_path = runs_dir.join(format!("run-{run_id}.csv"));
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let worker =
                    tokio::task::spawn_blocking(move || execute_run(run, &control, log_path));
                match worker.await {
                    Ok(report) => report,
                    Err(err) => {
                        error!(run_id, error = %err, "run panicked");
                        RunReport {
                            run_id,
                            status: RunStatus::Failed,
                            last_row: None,
                            error: Some(format!("run panicked: {err}")),
                        }
                    }
                }
            });
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let report = match joined {
                Ok(report) => report,
                Err(err) => {
                    error!(error = %err, "executor task failed");
                    continue;
                }
            };
            self.controls().remove(&report.run_id);
            if let Some(row) = &report.last_row {
                aggregate.update(row);
                if let Err(err) = aggregate.write() {
                    warn!(run_id = report.run_id, error = %err, "results file write failed");
                }
            }
            if report.status == RunStatus::Completed {
                let path = snapshot_path(&snapshots_dir, report.run_id);
                if let Err(err) = discard_snapshot(&path) {
                    warn!(run_id = report.run_id, error = %err, "stale snapshot not removed");
                }
            }
            reports.push(report);
        }
        if let Err(err) = aggregate.write() {
            warn!(error = %err, "results file write failed");
        }

        reports.sort_by_key(|report| report.run_id);
        let count = |status| reports.iter().filter(|r| r.status == status).count();
        info!(
            completed = count(RunStatus::Completed),
            canceled = count(RunStatus::Canceled),
            failed = count(RunStatus::Failed),
            results = %self.config.results_path().display(),
            "executor finished"
        );
        Ok(reports)
    }
}

fn create_dir(path: &Path) -> Result<(), ExecutorError> {
    fs::create_dir_all(path).map_err(|source| ExecutorError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Body of one worker: runs on a blocking thread.
fn execute_run(run: SimulationRun, control: &RunControl, log_path: PathBuf) -> RunReport {
    let run_id = run.id();
    // A run suspended before it starts waits here rather than after its
    // first batch.
    if control.checkpoint() == Checkpoint::Cancel {
        info!(run_id, "run canceled before start");
    }

    let log = CheckpointLog::new(log_path, run.config().write_buffer);
    drive(run, control, &mut Tracked::new(log), &mut NoOpRender)
}

/// Execute one run, turning a panic into a failed report that keeps the
/// last row recorded before it.
fn drive<S: CheckpointSink>(
    mut run: SimulationRun,
    control: &RunControl,
    sink: &mut Tracked<S>,
    render: &mut dyn RenderSink,
) -> RunReport {
    let run_id = run.id();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run.execute(control, &mut *sink, &mut *render)
    }));
    let (status, error) = match outcome {
        Ok(Ok(status)) => (status, None),
        Ok(Err(err)) => (run.status(), Some(err.to_string())),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(run_id, error = %message, "run panicked");
            if let Err(err) = sink.finish() {
                warn!(run_id, error = %err, "checkpoint log not flushed after panic");
            }
            (RunStatus::Failed, Some(format!("run panicked: {message}")))
        }
    };

    RunReport {
        run_id,
        status,
        last_row: sink.last.take(),
        error,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_owned())
}

/// Sink wrapper remembering the last row it accepted.
#[derive(Debug)]
struct Tracked<S> {
    inner: S,
    last: Option<ResultRow>,
}

impl<S> Tracked<S> {
    const fn new(inner: S) -> Self {
        Self { inner, last: None }
    }
}

impl<S: CheckpointSink> CheckpointSink for Tracked<S> {
    fn record(&mut self, row: &ResultRow) -> Result<(), CheckpointError> {
        self.last = Some(row.clone());
        self.inner.record(row)
    }

    fn finish(&mut self) -> Result<(), CheckpointError> {
        self.inner.finish()
    }
}

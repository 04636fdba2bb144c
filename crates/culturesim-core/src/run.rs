//! One simulation run: lazy setup, the checkpoint loop, and teardown.
//!
//! # Lifecycle
//!
//! A [`SimulationRun`] is created from a [`Configuration`] (or restored from
//! a [`RunSnapshot`]) without allocating its grid. The first call to
//! [`SimulationRun::execute`] builds the world, the starter copy and the
//! scratch buffers, then loops:
//!
//! 1. stop if the run has been canceled
//! 2. apply every pending event that is due
//! 3. stop if the iteration budget is spent
//! 4. run one checkpoint batch of `checkpoint_period` iterations
//! 5. record a [`ResultRow`], optionally persist a snapshot, render
//! 6. consult the [`RunControl`], which may block or cancel
//!
//! When the loop ends a final row is recorded if the state changed since the
//! last one, a canceled run persists a snapshot so it can be resumed, and
//! every buffer is released.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, info_span, warn};

use culturesim_agents::{CollectiveProcesses, InteractionRule, build_rule};
use culturesim_events::Event;
use culturesim_types::{Configuration, MetricsSnapshot, ResultRow, SimRng, seeded_rng};
use culturesim_world::{
    BeliefGrid, ClusterMetrics, World, WorldError, energy, foreign_dispersion, similarity,
};

use crate::checkpoint::CheckpointSink;
use crate::control::{Checkpoint, RunControl};
use crate::error::RunError;
use crate::render::RenderSink;
use crate::snapshot::{RunSnapshot, SNAPSHOT_VERSION, save_snapshot, snapshot_path};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created, not yet executed.
    Pending,
    /// Inside [`SimulationRun::execute`].
    Running,
    /// Spent its iteration budget.
    Completed,
    /// Stopped at a checkpoint on request.
    Canceled,
    /// Stopped by an error.
    Failed,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Snapshot destination and cadence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotPolicy {
    dir: PathBuf,
    every: u64,
}

/// Everything allocated at setup and released at teardown.
#[derive(Debug)]
struct RunState {
    world: World,
    starter: BeliefGrid,
    rng: SimRng,
    rule: Box<dyn InteractionRule>,
    collective: CollectiveProcesses,
    clusters: ClusterMetrics,
    iteration: u64,
    epoch: u64,
    last_metrics: Option<MetricsSnapshot>,
    started_at: DateTime<Utc>,
    elapsed_before_ms: u64,
}

impl RunState {
    fn setup(id: u64, config: &Configuration) -> Result<Self, RunError> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let world = World::random(config, &mut rng);
        info!(run_id = id, seed = config.seed, model = %config.model, "run set up");
        let starter = world.beliefs().clone();
        Ok(Self::assemble(config, world, starter, rng))
    }

    fn assemble(config: &Configuration, world: World, starter: BeliefGrid, rng: SimRng) -> Self {
        let len = world.len();
        Self {
            world,
            starter,
            rng,
            rule: build_rule(config),
            collective: CollectiveProcesses::new(config.features, config.traits),
            clusters: ClusterMetrics::new(len),
            iteration: 0,
            epoch: 0,
            last_metrics: None,
            started_at: Utc::now(),
            elapsed_before_ms: 0,
        }
    }

    fn metrics(&mut self) -> MetricsSnapshot {
        let beliefs = self.world.beliefs();
        let registry = self.world.registry();
        let bordered = self.clusters.bordered(beliefs);
        let borderless = self.clusters.borderless(beliefs, self.world.topology());
        MetricsSnapshot {
            clusters: bordered.count,
            largest_cluster: bordered.largest,
            institutions: registry.institution_count(),
            largest_institution: registry.largest_institution(),
            borderless_clusters: borderless.count,
            largest_borderless_cluster: borderless.largest,
            energy: energy(beliefs),
            foreign_dispersion: foreign_dispersion(beliefs),
            similarity: similarity(beliefs, &self.starter),
        }
    }

    fn elapsed_ms(&self, session: Option<Instant>) -> u64 {
        let now = session.map_or(0, |s| u64::try_from(s.elapsed().as_millis()).unwrap_or(u64::MAX));
        self.elapsed_before_ms.saturating_add(now)
    }

    fn run_batch(&mut self, config: &Configuration) -> Result<(), RunError> {
        let ticks = config.ticks_per_iteration();
        let collective = config.model.uses_institutions();
        for _ in 0..config.checkpoint_period {
            if self.iteration >= config.iterations {
                break;
            }
            for _ in 0..ticks {
                self.rule.apply_tick(&mut self.world, &mut self.rng)?;
            }
            self.iteration = self.iteration.saturating_add(1);

            if collective {
                if self.iteration.checked_rem(config.democracy_period) == Some(0) {
                    let changed = self.collective.democracy(&mut self.world, &mut self.rng);
                    debug!(iteration = self.iteration, changed, "democracy");
                }
                if self.iteration.checked_rem(config.propaganda_period) == Some(0) {
                    let changed = self.collective.propaganda(&mut self.world, &mut self.rng);
                    debug!(iteration = self.iteration, changed, "propaganda");
                }
            }
        }
        self.epoch = self.epoch.saturating_add(1);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SimulationRun
// ---------------------------------------------------------------------------

/// One run of one configuration, from setup to teardown.
#[derive(Debug)]
pub struct SimulationRun {
    id: u64,
    config: Configuration,
    events: Vec<Event>,
    status: RunStatus,
    snapshots: Option<SnapshotPolicy>,
    state: Option<RunState>,
}

impl SimulationRun {
    /// A pending run. Nothing is allocated until it executes.
    pub const fn new(id: u64, config: Configuration, events: Vec<Event>) -> Self {
        Self {
            id,
            config,
            events,
            status: RunStatus::Pending,
            snapshots: None,
            state: None,
        }
    }

    /// Rebuild a run from a snapshot, ready to continue where it stopped.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] if the stored configuration is invalid
    /// and [`RunError::World`] if the stored grids disagree in shape or the
    /// institution registry fails [`InstitutionRegistry::verify`].
    ///
    /// [`InstitutionRegistry::verify`]: culturesim_world::InstitutionRegistry::verify
    pub fn from_snapshot(snapshot: RunSnapshot) -> Result<Self, RunError> {
        let RunSnapshot {
            run_id,
            config,
            started_at,
            elapsed_ms,
            iteration,
            epoch,
            beliefs,
            registry,
            starter,
            rng,
            pending_events,
            last_metrics,
            ..
        } = snapshot;

        config.validate()?;
        if beliefs.shape() != config.shape() || beliefs.features() != config.features {
            return Err(WorldError::ShapeMismatch {
                reason: "stored beliefs do not match the stored configuration".to_owned(),
            }
            .into());
        }
        if starter.shape() != beliefs.shape() || starter.features() != beliefs.features() {
            return Err(WorldError::ShapeMismatch {
                reason: "starter grid does not match the current beliefs".to_owned(),
            }
            .into());
        }
        let world = World::new(beliefs, registry, config.radius, config.traits)?;

        let mut state = RunState::assemble(&config, world, starter, rng);
        state.iteration = iteration;
        state.epoch = epoch;
        state.last_metrics = last_metrics;
        state.started_at = started_at;
        state.elapsed_before_ms = elapsed_ms;

        info!(run_id, iteration, epoch, "run restored from snapshot");
        Ok(Self {
            id: run_id,
            config,
            events: pending_events,
            status: RunStatus::Pending,
            snapshots: None,
            state: Some(state),
        })
    }

    /// Persist a snapshot into `dir` every `every` checkpoints, and
    /// whenever the run is canceled. `every == 0` keeps only the
    /// cancellation snapshot.
    #[must_use]
    pub fn with_snapshots(mut self, dir: PathBuf, every: u64) -> Self {
        self.snapshots = Some(SnapshotPolicy { dir, every });
        self
    }

    /// Run identifier.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Run parameters.
    pub const fn config(&self) -> &Configuration {
        &self.config
    }

    /// Lifecycle status.
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Events not yet applied.
    pub fn pending_events(&self) -> &[Event] {
        &self.events
    }

    /// Iterations completed, or zero before setup.
    pub fn iteration(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.iteration)
    }

    /// Checkpoint batches completed, or zero before setup.
    pub fn epoch(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.epoch)
    }

    /// Serializable copy of the live state. `None` before setup and after
    /// teardown.
    pub fn snapshot(&self) -> Option<RunSnapshot> {
        self.state.as_ref().map(|state| self.snapshot_of(state, None))
    }

    /// Metrics of the current state, setting the run up if needed.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] if setup rejects the configuration.
    pub fn current_metrics(&mut self) -> Result<MetricsSnapshot, RunError> {
        Ok(self.current_row()?.metrics)
    }

    /// Result row describing the current state, setting the run up if
    /// needed. Nothing is recorded.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] if setup rejects the configuration.
    pub fn current_row(&mut self) -> Result<ResultRow, RunError> {
        let mut state = self
            .state
            .take()
            .map_or_else(|| RunState::setup(self.id, &self.config), Ok)?;
        let row = self.row_of(&mut state, None);
        self.state = Some(state);
        Ok(row)
    }

    /// Execute until the iteration budget is spent or `control` cancels.
    ///
    /// Every checkpoint row goes to `sink`; a sink failure is logged and
    /// the run continues. Frames go to `render` only when it asks for them.
    /// The run's buffers are released before this returns, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run. The status is then
    /// [`RunStatus::Failed`] and a best-effort final row has been recorded.
    pub fn execute(
        &mut self,
        control: &RunControl,
        sink: &mut dyn CheckpointSink,
        render: &mut dyn RenderSink,
    ) -> Result<RunStatus, RunError> {
        let _span = info_span!("run", run_id = self.id).entered();
        let session = Instant::now();
        self.status = RunStatus::Running;

        let mut state = match self.state.take() {
            Some(state) => state,
            None => match RunState::setup(self.id, &self.config) {
                Ok(state) => state,
                Err(err) => {
                    self.status = RunStatus::Failed;
                    error!(run_id = self.id, error = %err, "run setup failed");
                    return Err(err);
                }
            },
        };
        info!(
            run_id = self.id,
            iteration = state.iteration,
            iterations = self.config.iterations,
            "run started"
        );

        let outcome = self.drive(&mut state, control, sink, render, session);
        let status = match &outcome {
            Ok(false) => RunStatus::Completed,
            Ok(true) => RunStatus::Canceled,
            Err(_) => RunStatus::Failed,
        };

        let row = self.row_of(&mut state, Some(session));
        if state.last_metrics != Some(row.metrics) {
            state.last_metrics = Some(row.metrics);
            record(sink, &row);
        }
        if let (RunStatus::Canceled, Some(policy)) = (status, &self.snapshots) {
            self.persist(&state, &policy.dir, session);
        }
        if let Err(err) = sink.finish() {
            warn!(run_id = self.id, error = %err, "final checkpoint flush failed");
        }

        self.status = status;
        match &outcome {
            Ok(_) => info!(
                run_id = self.id,
                ?status,
                iteration = state.iteration,
                epoch = state.epoch,
                "run finished"
            ),
            Err(err) => error!(
                run_id = self.id,
                iteration = state.iteration,
                error = %err,
                "run failed"
            ),
        }
        drop(state);
        outcome.map(|_| status)
    }

    /// The checkpoint loop. Returns `true` when the run was canceled.
    fn drive(
        &mut self,
        state: &mut RunState,
        control: &RunControl,
        sink: &mut dyn CheckpointSink,
        render: &mut dyn RenderSink,
        session: Instant,
    ) -> Result<bool, RunError> {
        loop {
            if control.is_canceled() {
                return Ok(true);
            }
            self.apply_due_events(state)?;
            if state.iteration >= self.config.iterations {
                return Ok(false);
            }

            state.run_batch(&self.config)?;
            let row = self.row_of(state, Some(session));
            state.last_metrics = Some(row.metrics);
            debug!(
                run_id = self.id,
                iteration = row.iteration,
                epoch = row.generation,
                clusters = row.metrics.clusters,
                "checkpoint"
            );
            record(sink, &row);

            let due = self
                .snapshots
                .as_ref()
                .filter(|policy| state.epoch.checked_rem(policy.every) == Some(0));
            if let Some(policy) = due {
                self.persist(state, &policy.dir, session);
            }
            if render.wants_frames() {
                render.render(&state.world.render_state(self.id, state.iteration));
            }
            if control.checkpoint() == Checkpoint::Cancel {
                return Ok(true);
            }
        }
    }

    fn apply_due_events(&mut self, state: &mut RunState) -> Result<(), RunError> {
        if self.events.is_empty() {
            return Ok(());
        }
        let iteration = state.iteration;
        let (due, later): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.events)
            .into_iter()
            .partition(|event| event.is_due(iteration));
        self.events = later;

        for event in due {
            let outcome = event
                .execute(&mut state.world, &mut state.rng)
                .map_err(|source| RunError::Event {
                    event: event.to_string(),
                    source,
                })?;
            info!(
                run_id = self.id,
                %event,
                seed = outcome.seed,
                affected = outcome.affected,
                iteration,
                "event applied"
            );
        }
        Ok(())
    }

    /// Build a row from the current state.
    fn row_of(&self, state: &mut RunState, session: Option<Instant>) -> ResultRow {
        let metrics = state.metrics();
        ResultRow::new(
            self.id,
            &self.config,
            state.started_at,
            state.elapsed_ms(session),
            (state.iteration, state.epoch),
            metrics,
        )
    }

    fn snapshot_of(&self, state: &RunState, session: Option<Instant>) -> RunSnapshot {
        RunSnapshot {
            version: SNAPSHOT_VERSION,
            run_id: self.id,
            config: self.config.clone(),
            started_at: state.started_at,
            elapsed_ms: state.elapsed_ms(session),
            iteration: state.iteration,
            epoch: state.epoch,
            beliefs: state.world.beliefs().clone(),
            registry: state.world.registry().clone(),
            starter: state.starter.clone(),
            rng: state.rng.clone(),
            pending_events: self.events.clone(),
            last_metrics: state.last_metrics,
        }
    }

    /// Write a snapshot; a failure is logged and the run continues.
    fn persist(&self, state: &RunState, dir: &std::path::Path, session: Instant) {
        let path = snapshot_path(dir, self.id);
        if let Err(err) = save_snapshot(&path, &self.snapshot_of(state, Some(session))) {
            warn!(run_id = self.id, error = %err, "snapshot save failed");
        }
    }
}

fn record(sink: &mut dyn CheckpointSink, row: &ResultRow) {
    if let Err(err) = sink.record(row) {
        warn!(run_id = row.run_id, error = %err, "checkpoint write failed, rows kept for retry");
    }
}

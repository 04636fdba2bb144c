//! Run lifecycle scenarios: determinism, cancellation, snapshot resume.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;

use culturesim_core::{
    NoOpRender, RenderSink, RunControl, RunStatus, SimulationRun, list_snapshots, load_snapshot,
    snapshot_path,
};
use culturesim_events::{Event, parse_event_list};
use culturesim_types::{Configuration, MetricsSnapshot, ModelKind, RenderableState, ResultRow};

fn config(model: ModelKind, seed: u64) -> Configuration {
    Configuration {
        model,
        rows: 8,
        cols: 8,
        features: 3,
        traits: 4,
        iterations: 12,
        checkpoint_period: 4,
        mutation: 0.01,
        selection_error: 0.02,
        democracy_period: 2,
        propaganda_period: 5,
        seed,
        ..Configuration::default()
    }
}

fn events() -> Vec<Event> {
    parse_event_list("S@R,0,0,1,1 D@U,0.2#10").unwrap()
}

/// Progress and metrics of every row, without the wall-clock fields.
fn trace(rows: &[ResultRow]) -> Vec<(u64, u64, MetricsSnapshot)> {
    rows.iter()
        .map(|row| (row.iteration, row.generation, row.metrics))
        .collect()
}

fn run_to_end(id: u64, config: Configuration, events: Vec<Event>) -> Vec<ResultRow> {
    let mut run = SimulationRun::new(id, config, events);
    let mut rows: Vec<ResultRow> = Vec::new();
    let status = run
        .execute(&RunControl::default(), &mut rows, &mut NoOpRender)
        .unwrap();
    assert_eq!(status, RunStatus::Completed);
    rows
}

/// Cancels the run once a frame at or past `at` iterations is rendered.
struct CancelAt {
    control: Arc<RunControl>,
    at: u64,
    frames: usize,
}

impl RenderSink for CancelAt {
    fn render(&mut self, state: &RenderableState) {
        self.frames += 1;
        if state.iteration >= self.at {
            self.control.cancel();
        }
    }
}

#[test]
fn same_seed_gives_identical_rows() {
    for model in [ModelKind::Axelrod, ModelKind::Flache, ModelKind::Institutional] {
        let a = run_to_end(1, config(model, 5), events());
        let b = run_to_end(1, config(model, 5), events());
        assert_eq!(trace(&a), trace(&b), "{model}");
    }
}

#[test]
fn events_after_the_last_batch_add_a_final_row() {
    let rows = run_to_end(1, config(ModelKind::Institutional, 5), events());
    let progress: Vec<(u64, u64)> = rows.iter().map(|r| (r.iteration, r.generation)).collect();
    // The #10 decimation fires at the 12-iteration boundary, after the last
    // batch, so the final state gets its own row.
    assert_eq!(progress, vec![(4, 1), (8, 2), (12, 3), (12, 3)]);
    assert_ne!(rows[2].metrics, rows[3].metrics);
}

#[test]
fn cancel_lets_the_current_batch_finish_and_stops_there() {
    let control = Arc::new(RunControl::default());
    let mut render = CancelAt {
        control: Arc::clone(&control),
        at: 0,
        frames: 0,
    };
    let mut run = SimulationRun::new(2, config(ModelKind::Axelrod, 9), Vec::new());
    let mut rows: Vec<ResultRow> = Vec::new();
    let status = run.execute(&control, &mut rows, &mut render).unwrap();

    assert_eq!(status, RunStatus::Canceled);
    assert_eq!(render.frames, 1);
    assert_eq!(rows.len(), 1);
    assert_eq!((rows[0].iteration, rows[0].generation), (4, 1));
}

#[test]
fn resumed_run_matches_the_uninterrupted_one() {
    let model = ModelKind::Institutional;
    let reference = run_to_end(3, config(model, 21), events());

    let dir = tempfile::tempdir().unwrap();
    let control = Arc::new(RunControl::default());
    let mut render = CancelAt {
        control: Arc::clone(&control),
        at: 8,
        frames: 0,
    };
    let mut first = SimulationRun::new(3, config(model, 21), events())
        .with_snapshots(dir.path().to_path_buf(), 0);
    let mut rows: Vec<ResultRow> = Vec::new();
    let status = first.execute(&control, &mut rows, &mut render).unwrap();
    assert_eq!(status, RunStatus::Canceled);
    assert_eq!(rows.last().map(|r| r.iteration), Some(8));
    assert_eq!(list_snapshots(dir.path()).unwrap(), vec![snapshot_path(dir.path(), 3)]);

    let snapshot = load_snapshot(&snapshot_path(dir.path(), 3)).unwrap();
    assert_eq!((snapshot.iteration, snapshot.epoch), (8, 2));
    assert_eq!(snapshot.pending_events.len(), 1);

    // Zero further ticks: the restored state describes the same row.
    let mut restored = SimulationRun::from_snapshot(snapshot.clone()).unwrap();
    let row = restored.current_row().unwrap();
    let last = rows.last().unwrap();
    assert_eq!(
        (row.iteration, row.generation, row.metrics),
        (last.iteration, last.generation, last.metrics)
    );
    assert_eq!(row.started_at, last.started_at);

    let mut resumed = SimulationRun::from_snapshot(snapshot).unwrap();
    let status = resumed
        .execute(&RunControl::default(), &mut rows, &mut NoOpRender)
        .unwrap();
    assert_eq!(status, RunStatus::Completed);
    assert_eq!(trace(&rows), trace(&reference));
}

#[test]
fn current_metrics_sets_up_a_pending_run() {
    let mut run = SimulationRun::new(4, config(ModelKind::Flache, 2), Vec::new());
    assert!(run.snapshot().is_none());
    let metrics = run.current_metrics().unwrap();
    assert_eq!(metrics.similarity, 8 * 8 * 3);
    assert_eq!(metrics.institutions, 64);
    assert_eq!(run.snapshot().map(|s| s.iteration), Some(0));
    assert_eq!(run.status(), RunStatus::Pending);
}

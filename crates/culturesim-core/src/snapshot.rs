//! Full-fidelity run snapshots.
//!
//! A [`RunSnapshot`] carries everything needed to continue a run exactly
//! where it stopped: beliefs, the institution arena with its membership
//! links, the starter grid, the generator state, the progress counters,
//! and the events not yet applied. Neighborhood lists, vote buffers and
//! cluster scratch are derived state and are rebuilt on load.
//!
//! On disk a snapshot is JSON compressed with gzip, one file per run:
//! `<output>/snapshots/run-<id>.json.gz`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};

use culturesim_events::Event;
use culturesim_types::{Configuration, MetricsSnapshot, SimRng};
use culturesim_world::{BeliefGrid, InstitutionRegistry};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Error type for snapshot persistence.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The file could not be read or written.
    #[error("snapshot I/O on {}: {source}", path.display())]
    Io {
        /// Snapshot file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("snapshot encoding in {}: {source}", path.display())]
    Encoding {
        /// Snapshot file.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The file was written by an incompatible format version.
    #[error("snapshot {} has version {found}, expected {SNAPSHOT_VERSION}", path.display())]
    Version {
        /// Snapshot file.
        path: PathBuf,
        /// Version found in the file.
        found: u32,
    },
}

impl SnapshotError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Serializable state of one run at a checkpoint boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Format version.
    pub version: u32,
    /// Run identifier.
    pub run_id: u64,
    /// Run parameters, including the seed the run started from.
    pub config: Configuration,
    /// When the run was first set up.
    pub started_at: DateTime<Utc>,
    /// Wall-clock milliseconds spent executing before the snapshot.
    pub elapsed_ms: u64,
    /// Iterations completed.
    pub iteration: u64,
    /// Checkpoint batches completed.
    pub epoch: u64,
    /// Current beliefs.
    pub beliefs: BeliefGrid,
    /// Institutions and membership links.
    pub registry: InstitutionRegistry,
    /// Beliefs at setup, for the similarity metric.
    pub starter: BeliefGrid,
    /// Generator state.
    pub rng: SimRng,
    /// Events not yet applied.
    pub pending_events: Vec<Event>,
    /// Metrics of the last row emitted.
    pub last_metrics: Option<MetricsSnapshot>,
}

/// Snapshot file of run `run_id` inside `dir`.
pub fn snapshot_path(dir: &Path, run_id: u64) -> PathBuf {
    dir.join(format!("run-{run_id}.json.gz"))
}

/// Write `snapshot` to `path`, creating parent directories.
///
/// The file is written under a temporary name and renamed into place, so
/// an interrupted write leaves the previous snapshot intact.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] or [`SnapshotError::Encoding`].
pub fn save_snapshot(path: &Path, snapshot: &RunSnapshot) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(SnapshotError::io(parent))?;
    }
    let tmp = path.with_extension("gz.tmp");
    let file = File::create(&tmp).map_err(SnapshotError::io(&tmp))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, snapshot).map_err(|source| SnapshotError::Encoding {
        path: tmp.clone(),
        source,
    })?;
    let mut inner = encoder.finish().map_err(SnapshotError::io(&tmp))?;
    inner.flush().map_err(SnapshotError::io(&tmp))?;
    drop(inner);
    fs::rename(&tmp, path).map_err(SnapshotError::io(path))?;
    tracing::debug!(path = %path.display(), iteration = snapshot.iteration, "snapshot saved");
    Ok(())
}

/// Read a snapshot written by [`save_snapshot`].
///
/// # Errors
///
/// Returns [`SnapshotError::Io`], [`SnapshotError::Encoding`], or
/// [`SnapshotError::Version`] for a file from another format version.
pub fn load_snapshot(path: &Path) -> Result<RunSnapshot, SnapshotError> {
    let file = File::open(path).map_err(SnapshotError::io(path))?;
    let snapshot: RunSnapshot = serde_json::from_reader(GzDecoder::new(BufReader::new(file)))
        .map_err(|source| SnapshotError::Encoding {
            path: path.to_path_buf(),
            source,
        })?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::Version {
            path: path.to_path_buf(),
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}

/// Remove a snapshot that is no longer needed. A missing file is not an
/// error.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] if the file exists and cannot be removed.
pub fn discard_snapshot(path: &Path) -> Result<(), SnapshotError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Every snapshot file in `dir`, sorted by name.
///
/// # Errors
///
/// Returns [`SnapshotError::Io`] if the directory cannot be listed.
pub fn list_snapshots(dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
    let entries = fs::read_dir(dir).map_err(|source| SnapshotError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.to_string_lossy().ends_with(".json.gz"))
        .collect();
    paths.sort();
    Ok(paths)
}

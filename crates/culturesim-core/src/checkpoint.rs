//! Checkpoint output: per-run logs and the aggregate results file.
//!
//! Rows are plain CSV lines in the [`ResultRow::CSV_HEADER`] schema.
//! A per-run [`CheckpointLog`] buffers rows in memory and appends them once
//! `write_buffer` rows are pending; if the append fails the rows stay
//! pending and the next checkpoint retries. Rows still pending when a log
//! is dropped, for example while a run unwinds, are written one last time.
//! The [`AggregateWriter`] keeps
//! one row per run and rewrites its file atomically (temp file, then
//! rename) so a reader never sees a half-written file.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use culturesim_types::ResultRow;

/// Errors raised while writing checkpoint output.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// A file could not be read or written.
    #[error("checkpoint I/O on {}: {source}", path.display())]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl CheckpointError {
    fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Destination of the rows a run produces at its checkpoints.
pub trait CheckpointSink: Send {
    /// Accept one row. May write buffered rows; on error the rows must
    /// remain pending for the next call.
    fn record(&mut self, row: &ResultRow) -> Result<(), CheckpointError>;

    /// Write everything still pending.
    fn finish(&mut self) -> Result<(), CheckpointError>;
}

impl CheckpointSink for Vec<ResultRow> {
    fn record(&mut self, row: &ResultRow) -> Result<(), CheckpointError> {
        self.push(row.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CheckpointError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-run log
// ---------------------------------------------------------------------------

/// Buffered append-only CSV log of one run.
#[derive(Debug)]
pub struct CheckpointLog {
    path: PathBuf,
    write_buffer: usize,
    pending: Vec<String>,
    header_written: bool,
}

impl CheckpointLog {
    /// Log at `path`, flushing every `write_buffer` rows. An existing
    /// non-empty file is appended to without a second header.
    pub fn new(path: PathBuf, write_buffer: usize) -> Self {
        let header_written = fs::metadata(&path).is_ok_and(|m| m.len() > 0);
        Self {
            path,
            write_buffer: write_buffer.max(1),
            pending: Vec::new(),
            header_written,
        }
    }

    /// File this log appends to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows accepted but not yet written.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn write_pending(&mut self) -> Result<(), CheckpointError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(CheckpointError::io(parent))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(CheckpointError::io(&self.path))?;
        let mut out = BufWriter::new(file);
        let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            if !self.header_written {
                writeln!(out, "{}", ResultRow::CSV_HEADER)?;
            }
            for line in &self.pending {
                writeln!(out, "{line}")?;
            }
            out.flush()
        };
        write(&mut out).map_err(CheckpointError::io(&self.path))?;

        tracing::debug!(path = %self.path.display(), rows = self.pending.len(), "checkpoint rows written");
        self.header_written = true;
        self.pending.clear();
        Ok(())
    }
}

impl CheckpointSink for CheckpointLog {
    fn record(&mut self, row: &ResultRow) -> Result<(), CheckpointError> {
        self.pending.push(row.to_csv_record());
        if self.pending.len() >= self.write_buffer {
            self.write_pending()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), CheckpointError> {
        self.write_pending()
    }
}

impl Drop for CheckpointLog {
    fn drop(&mut self) {
        let rows = self.pending.len();
        if let Err(err) = self.write_pending() {
            tracing::warn!(path = %self.path.display(), rows, error = %err, "pending checkpoint rows lost");
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate file
// ---------------------------------------------------------------------------

/// Latest row of every run, rewritten as a whole.
#[derive(Debug)]
pub struct AggregateWriter {
    path: PathBuf,
    rows: BTreeMap<u64, String>,
}

impl AggregateWriter {
    /// Writer for `path`, keeping the rows of an existing file so runs
    /// that are not re-executed survive a resume.
    pub fn open(path: PathBuf) -> Result<Self, CheckpointError> {
        let mut rows = BTreeMap::new();
        if path.exists() {
            let text = fs::read_to_string(&path).map_err(CheckpointError::io(&path))?;
            for line in text.lines().skip(1) {
                let id = line.split(',').next().and_then(|f| f.trim().parse::<u64>().ok());
                if let Some(id) = id {
                    rows.insert(id, line.to_owned());
                }
            }
        }
        Ok(Self { path, rows })
    }

    /// Replace the row of `row.run_id`.
    pub fn update(&mut self, row: &ResultRow) {
        self.rows.insert(row.run_id, row.to_csv_record());
    }

    /// Number of runs with a row.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no run has a row yet.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rewrite the file through a temporary sibling.
    pub fn write(&self) -> Result<(), CheckpointError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(CheckpointError::io(parent))?;
        }
        let tmp = self.path.with_extension("csv.tmp");
        let file = File::create(&tmp).map_err(CheckpointError::io(&tmp))?;
        let mut out = BufWriter::new(file);
        let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
            writeln!(out, "{}", ResultRow::CSV_HEADER)?;
            for line in self.rows.values() {
                writeln!(out, "{line}")?;
            }
            out.flush()
        };
        write(&mut out).map_err(CheckpointError::io(&tmp))?;
        drop(out);
        fs::rename(&tmp, &self.path).map_err(CheckpointError::io(&self.path))?;
        Ok(())
    }
}

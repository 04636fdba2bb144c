//! Checkpoint result records.
//!
//! One [`ResultRow`] is produced per checkpoint. It carries the run's
//! identifying parameters plus a [`MetricsSnapshot`] of the scalar metrics.
//! The same schema is used by the per-run checkpoint log and the aggregate
//! results file.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Configuration, ModelKind};

/// Scalar metrics computed at a checkpoint.
///
/// Contains no wall-clock data, so two runs with the same seed and
/// configuration produce identical snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Number of 4-neighbor (bordered) clusters.
    pub clusters: u64,
    /// Size of the largest bordered cluster.
    pub largest_cluster: u64,
    /// Number of institutions with at least one member.
    pub institutions: u64,
    /// Member count of the largest institution.
    pub largest_institution: u64,
    /// Number of neighborhood-radius (borderless) clusters.
    pub borderless_clusters: u64,
    /// Size of the largest borderless cluster.
    pub largest_borderless_cluster: u64,
    /// Adjacent-cell feature mismatches across the grid.
    pub energy: u64,
    /// Features currently holding the foreign trait.
    pub foreign_dispersion: u64,
    /// Features unchanged since the run's starter snapshot.
    pub similarity: u64,
}

/// One checkpoint record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Run identifier.
    pub run_id: u64,
    /// Wall-clock time the run was first started.
    pub started_at: DateTime<Utc>,
    /// Accumulated execution time in milliseconds.
    pub elapsed_ms: u64,
    /// Iteration budget.
    pub iterations: u64,
    /// Iterations per checkpoint.
    pub checkpoint_period: u64,
    /// Interaction variant.
    pub model: ModelKind,
    /// Grid rows.
    pub rows: usize,
    /// Grid columns.
    pub cols: usize,
    /// Belief-vector length.
    pub features: usize,
    /// Traits per feature.
    pub traits: usize,
    /// Neighborhood radius.
    pub radius: usize,
    /// Institutional influence.
    pub alpha: f64,
    /// Institutional loyalty.
    pub alpha_prime: f64,
    /// Democracy period.
    pub democracy_period: u64,
    /// Propaganda period.
    pub propaganda_period: u64,
    /// Mutation rate.
    pub mutation: f64,
    /// Selection-error rate.
    pub selection_error: f64,
    /// Iterations completed so far.
    pub iteration: u64,
    /// Checkpoint batches completed so far.
    pub generation: u64,
    /// Metrics at this checkpoint.
    pub metrics: MetricsSnapshot,
}

impl ResultRow {
    /// Column header shared by checkpoint logs and the aggregate file.
    pub const CSV_HEADER: &'static str = "id,start,elapsed_ms,iterations,checkpoint,type,\
rows,cols,features,traits,radius,alpha,alpha_prime,freq_dem,freq_prop,mutation,\
selection_error,iteration,generation,clusters,largest_cluster,institutions,\
largest_institution,borderless_clusters,largest_borderless_cluster,energy,\
foreign_dispersion,similarity";

    /// Build a row from a configuration and the run's progress counters.
    pub fn new(
        run_id: u64,
        config: &Configuration,
        started_at: DateTime<Utc>,
        elapsed_ms: u64,
        progress: (u64, u64),
        metrics: MetricsSnapshot,
    ) -> Self {
        let (iteration, generation) = progress;
        Self {
            run_id,
            started_at,
            elapsed_ms,
            iterations: config.iterations,
            checkpoint_period: config.checkpoint_period,
            model: config.model,
            rows: config.rows,
            cols: config.cols,
            features: config.features,
            traits: config.traits,
            radius: config.radius,
            alpha: config.alpha,
            alpha_prime: config.alpha_prime,
            democracy_period: config.democracy_period,
            propaganda_period: config.propaganda_period,
            mutation: config.mutation,
            selection_error: config.selection_error,
            iteration,
            generation,
            metrics,
        }
    }

    /// Render the row as one comma-separated line (no trailing newline).
    pub fn to_csv_record(&self) -> String {
        let m = &self.metrics;
        let mut line = String::with_capacity(256);
        // Writing into a String cannot fail.
        let _ = write!(
            line,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.run_id,
            self.started_at.to_rfc3339(),
            self.elapsed_ms,
            self.iterations,
            self.checkpoint_period,
            self.model,
            self.rows,
            self.cols,
            self.features,
            self.traits,
            self.radius,
            self.alpha,
            self.alpha_prime,
            self.democracy_period,
            self.propaganda_period,
            self.mutation,
            self.selection_error,
            self.iteration,
            self.generation,
            m.clusters,
            m.largest_cluster,
            m.institutions,
            m.largest_institution,
            m.borderless_clusters,
            m.largest_borderless_cluster,
            m.energy,
            m.foreign_dispersion,
            m.similarity,
        );
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_has_one_field_per_header_column() {
        let row = ResultRow::new(
            3,
            &Configuration::default(),
            Utc::now(),
            12,
            (100, 1),
            MetricsSnapshot {
                clusters: 4,
                ..MetricsSnapshot::default()
            },
        );
        let header_cols = ResultRow::CSV_HEADER.split(',').count();
        let record = row.to_csv_record();
        assert_eq!(record.split(',').count(), header_cols);
        assert!(record.starts_with("3,"));
        assert!(record.contains(",institutional,"));
    }
}

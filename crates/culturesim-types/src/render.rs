//! Read-only view of a run handed to render sinks at checkpoints.

use serde::{Deserialize, Serialize};

use crate::beliefs::Trait;
use crate::grid::{Cell, GridShape};

/// Copy of the visible state of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderableState {
    /// Run identifier.
    pub run_id: u64,
    /// Grid dimensions.
    pub shape: GridShape,
    /// Belief-vector length.
    pub features: usize,
    /// Beliefs, `cell * features + feature`.
    pub beliefs: Vec<Trait>,
    /// Institution id of every cell.
    pub institutions: Vec<Cell>,
    /// Iterations completed.
    pub iteration: u64,
}

impl RenderableState {
    /// Beliefs of one cell, or an empty slice outside the grid.
    pub fn cell_beliefs(&self, cell: Cell) -> &[Trait] {
        let start = cell.saturating_mul(self.features);
        let end = start.saturating_add(self.features);
        self.beliefs.get(start..end).unwrap_or(&[])
    }
}

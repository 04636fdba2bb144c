//! Grid dimensions and flattened cell addressing.

use serde::{Deserialize, Serialize};

/// Flattened cell index (`row * cols + col`).
///
/// Institution ids use the same index space.
pub type Cell = usize;

/// Dimensions of the agent grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl GridShape {
    /// Create a shape from row and column counts.
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells.
    pub const fn len(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Whether the grid has no cells.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten a coordinate. Returns `None` outside the grid.
    pub const fn index(&self, row: usize, col: usize) -> Option<Cell> {
        if row < self.rows && col < self.cols {
            Some(row.saturating_mul(self.cols).saturating_add(col))
        } else {
            None
        }
    }

    /// Flatten a signed coordinate, clipping (returning `None`) at the
    /// grid border. The grid is not toroidal.
    pub fn offset(&self, row: usize, col: usize, dr: isize, dc: isize) -> Option<Cell> {
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        self.index(r, c)
    }

    /// Expand a flattened index back into `(row, col)`.
    pub fn coords(&self, cell: Cell) -> (usize, usize) {
        let cols = self.cols.max(1);
        (cell.checked_div(cols).unwrap_or(0), cell.checked_rem(cols).unwrap_or(0))
    }
}

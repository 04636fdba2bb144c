//! Error types for the `culturesim-world` crate.

use culturesim_types::Cell;

/// Errors raised by grid state operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// A cell or institution id outside the arena was addressed.
    #[error("cell {cell} is outside the grid ({len} cells)")]
    CellOutOfRange {
        /// The offending index.
        cell: Cell,
        /// Number of cells in the grid.
        len: usize,
    },

    /// No institution id with zero members was available.
    #[error("no free institution id for cell {cell}")]
    NoFreeInstitution {
        /// The agent that tried to found an institution.
        cell: Cell,
    },

    /// A membership list violates the cycle invariant.
    #[error("institution {institution} membership corrupted: {reason}")]
    MembershipCorrupted {
        /// The institution whose list is broken.
        institution: Cell,
        /// What was found.
        reason: String,
    },

    /// Member counts do not add up to the number of agents.
    #[error("member counts sum to {actual}, expected {expected}")]
    CountMismatch {
        /// Number of agents on the grid.
        expected: u64,
        /// Sum of all institution member counts.
        actual: u64,
    },

    /// Two components of a world disagree on the grid dimensions.
    #[error("shape mismatch: {reason}")]
    ShapeMismatch {
        /// Which components disagree.
        reason: String,
    },
}

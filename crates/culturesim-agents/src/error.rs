//! Error types for the culturesim-agents crate.

use culturesim_world::WorldError;

/// Errors raised while applying an interaction rule or collective process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// A membership operation failed.
    #[error(transparent)]
    World(#[from] WorldError),

    /// The rule was built for a different belief-vector length.
    #[error("rule expects {expected} features but the world has {actual}")]
    FeatureMismatch {
        /// Feature count the rule was configured with.
        expected: usize,
        /// Feature count of the world it was applied to.
        actual: usize,
    },
}

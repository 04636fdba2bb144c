//! Error types for the culturesim-events crate.

use culturesim_world::WorldError;

/// Errors raised while parsing or executing events.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    /// A token of the mini-language could not be understood.
    #[error("invalid event token `{token}`: {reason}")]
    Parse {
        /// The offending token.
        token: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A membership operation failed while applying the event.
    #[error(transparent)]
    World(#[from] WorldError),
}

impl EventError {
    pub(crate) fn parse(token: &str, reason: impl Into<String>) -> Self {
        Self::Parse {
            token: token.to_owned(),
            reason: reason.into(),
        }
    }
}

//! Agent behavior for culturesim.
//!
//! This crate holds the logic that mutates a [`World`] over time: the
//! per-tick interaction rules (one per model variant) and the periodic
//! collective processes that run inside institutions. It performs no I/O
//! and owns no state beyond scratch buffers; the grid lives in
//! `culturesim-world` and scheduling lives in `culturesim-core`.
//!
//! # Modules
//!
//! - [`collective`] -- Democracy and propaganda ([`CollectiveProcesses`])
//! - [`error`] -- Error types for rule execution ([`ModelError`])
//! - [`rules`] -- The [`InteractionRule`] trait and its variants
//!
//! [`World`]: culturesim_world::World

pub mod collective;
pub mod error;
pub mod rules;

pub use collective::CollectiveProcesses;
pub use error::ModelError;
pub use rules::{
    AxelrodRule, FlacheRule, InstitutionalRule, InteractionRule, TickEffects, build_rule,
};

//! Perturbation events for culturesim.
//!
//! An [`Event`] pairs an [`EventKind`] (what happens to a triggered cell)
//! with a [`Distribution`] (the per-cell trigger probability). Events are
//! written in a compact mini-language:
//!
//! ```text
//! <kind>@<distribution>[#<iteration>]
//!
//! D@U,0.1             decimate 10% of the grid
//! S@W,0.5,0.5,3       settle a radius-3 diamond in the middle
//! C@N,0,0,1,4#500     convert institutions near the top-left at iteration 500
//! X@R,0,0,9,9         destroy the institutions of a 10x10 block
//! ```
//!
//! Every execution draws a fresh seed from the caller's RNG and runs on its
//! own generator, so any single execution can be replayed from its logged
//! seed.
//!
//! # Modules
//!
//! - [`distribution`] -- [`Distribution`] and per-cell probabilities
//! - [`error`] -- [`EventError`]
//! - [`event`] -- [`Event`], [`EventKind`], execution
//! - [`parse`] -- the mini-language ([`parse_event_list`])

pub mod distribution;
pub mod error;
pub mod event;
pub mod parse;

pub use distribution::Distribution;
pub use error::EventError;
pub use event::{Event, EventKind, EventOutcome};
pub use parse::parse_event_list;

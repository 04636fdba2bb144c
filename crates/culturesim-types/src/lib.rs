//! Shared type definitions for the culturesim simulation.
//!
//! This crate is the single source of truth for the vocabulary shared by
//! the world, agents, events, and core crates: trait sentinels, grid
//! addressing, per-run configuration, and the checkpoint result records.
//!
//! # Modules
//!
//! - [`beliefs`] -- The [`Trait`] value type and its reserved sentinels
//! - [`config`] -- Per-run [`Configuration`] and the [`ModelKind`] tag
//! - [`grid`] -- [`GridShape`] and flattened cell addressing
//! - [`render`] -- [`RenderableState`] handed to render sinks
//! - [`result`] -- [`ResultRow`] and [`MetricsSnapshot`] checkpoint records
//! - [`rng`] -- The seeded, serializable [`SimRng`] used by every run

pub mod beliefs;
pub mod config;
pub mod grid;
pub mod render;
pub mod result;
pub mod rng;

pub use beliefs::{DEAD, FOREIGN, Trait, UNSET, is_live};
pub use config::{ConfigurationError, Configuration, ModelKind};
pub use grid::{Cell, GridShape};
pub use render::RenderableState;
pub use result::{MetricsSnapshot, ResultRow};
pub use rng::{SimRng, seeded_rng, unit_draw};

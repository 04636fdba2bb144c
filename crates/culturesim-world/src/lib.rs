//! Spatial state of a culturesim run.
//!
//! This crate models everything that lives on the grid: the precomputed
//! neighborhood lists, the belief vectors of every agent, the institution
//! arena with its circular membership lists, and the connected-component
//! metrics computed at checkpoints. It performs no I/O.
//!
//! # Modules
//!
//! - [`beliefs`] -- [`BeliefGrid`], the flat belief store
//! - [`clusters`] -- [`ClusterMetrics`] and the scalar grid metrics
//! - [`error`] -- [`WorldError`] for membership and addressing faults
//! - [`institutions`] -- [`InstitutionRegistry`], the membership arena
//! - [`topology`] -- [`NeighborTopology`], diamond neighborhoods
//! - [`world`] -- [`World`], the aggregate the interaction rules mutate

pub mod beliefs;
pub mod clusters;
pub mod error;
pub mod institutions;
pub mod topology;
pub mod world;

pub use beliefs::BeliefGrid;
pub use clusters::{ClusterMetrics, ClusterStats, energy, foreign_dispersion, similarity};
pub use error::WorldError;
pub use institutions::{InstitutionRegistry, Members};
pub use topology::NeighborTopology;
pub use world::World;

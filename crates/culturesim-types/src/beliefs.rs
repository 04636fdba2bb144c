//! Trait values and the sentinels reserved outside the valid trait range.
//!
//! Valid traits are `0..traits`. Three negative values are reserved and can
//! never be produced by mutation or initialization:
//!
//! - [`UNSET`] marks an institution slot with no recorded opinion.
//! - [`DEAD`] marks an agent slot killed by a decimation event.
//! - [`FOREIGN`] marks a belief introduced from outside the population
//!   (settlers, immigrants, converted institutions).

/// A single feature value held by an agent or an institution.
pub type Trait = i32;

/// Institution slot without a recorded trait.
pub const UNSET: Trait = -1;

/// Agent slot belonging to a killed agent.
pub const DEAD: Trait = -2;

/// Externally introduced belief.
pub const FOREIGN: Trait = -3;

/// Whether an agent slot still takes part in interactions.
///
/// `FOREIGN` counts as live: settlers interact like everybody else.
pub const fn is_live(value: Trait) -> bool {
    value != DEAD && value != UNSET
}

//! Per-tick interaction rules.
//!
//! One elementary tick picks a random agent and one random neighbor from
//! its topology list, lets the model variant decide whether and what the
//! agent copies, then applies mutation to the same agent. The variants
//! differ only in that decision:
//!
//! - [`AxelrodRule`] -- pure homophily, fires on `homophily XOR error`
//! - [`FlacheRule`] -- multilateral weighted vote over the whole neighborhood
//! - [`InstitutionalRule`] -- homophily damped by institutional resistance,
//!   followed by institutional switching
//!
//! A neighbor with no live feature makes the tick a no-op. No value is ever
//! copied into or out of a [`DEAD`] slot.
//!
//! [`DEAD`]: culturesim_types::DEAD

mod axelrod;
mod flache;
mod institutional;

use std::fmt::Debug;

use rand::Rng;
use rand::seq::IndexedRandom;

use culturesim_types::{Cell, Configuration, ModelKind, SimRng, Trait, UNSET, is_live, unit_draw};
use culturesim_world::World;

use crate::error::ModelError;

pub use axelrod::AxelrodRule;
pub use flache::FlacheRule;
pub use institutional::InstitutionalRule;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What one elementary tick changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEffects {
    /// A belief was overwritten with a different value by interaction.
    pub copied: bool,
    /// The agent moved into its neighbor's institution.
    pub switched: bool,
    /// The mutation step overwrote a belief.
    pub mutated: bool,
}

/// The update protocol of one model variant.
pub trait InteractionRule: Debug + Send {
    /// Which model this rule implements.
    fn kind(&self) -> ModelKind;

    /// Execute one elementary tick against `world`.
    fn apply_tick(&mut self, world: &mut World, rng: &mut SimRng)
    -> Result<TickEffects, ModelError>;
}

/// Build the rule selected by `config.model`.
pub fn build_rule(config: &Configuration) -> Box<dyn InteractionRule> {
    match config.model {
        ModelKind::Axelrod => Box::new(AxelrodRule::new(config)),
        ModelKind::Flache => Box::new(FlacheRule::new(config)),
        ModelKind::Institutional => Box::new(InstitutionalRule::new(config)),
    }
}

// ---------------------------------------------------------------------------
// Shared tick steps
// ---------------------------------------------------------------------------

/// Parameters every variant shares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BaseParams {
    pub features: usize,
    pub traits: usize,
    pub mutation: f64,
    pub selection_error: f64,
}

impl BaseParams {
    pub(crate) const fn from_config(config: &Configuration) -> Self {
        Self {
            features: config.features,
            traits: config.traits,
            mutation: config.mutation,
            selection_error: config.selection_error,
        }
    }

    pub(crate) const fn check(&self, world: &World) -> Result<(), ModelError> {
        let actual = world.beliefs().features();
        if actual == self.features {
            Ok(())
        } else {
            Err(ModelError::FeatureMismatch {
                expected: self.features,
                actual,
            })
        }
    }
}

/// Uniform agent plus uniform neighbor, or `None` when the agent has no
/// neighbors or the neighbor is wholly dead.
pub(crate) fn pick_pair(world: &World, rng: &mut SimRng) -> Option<(Cell, Cell)> {
    let len = world.len();
    if len == 0 {
        return None;
    }
    let cell = rng.random_range(0..len);
    let neighbor = *world.topology().neighbors(cell).choose(rng)?;
    if world.beliefs().is_wholly_dead(neighbor) {
        return None;
    }
    Some((cell, neighbor))
}

/// Overlap between two belief vectors over slots live in both, collecting
/// the mismatched live features into `mismatches`.
pub(crate) fn compare(agent: &[Trait], other: &[Trait], mismatches: &mut Vec<usize>) -> usize {
    mismatches.clear();
    let mut overlap = 0_usize;
    for (feature, (&a, &b)) in agent.iter().zip(other).enumerate() {
        if !is_live(a) || !is_live(b) {
            continue;
        }
        if a == b {
            overlap = overlap.saturating_add(1);
        } else {
            mismatches.push(feature);
        }
    }
    overlap
}

/// Features where a live belief equals a recorded institution trait.
pub(crate) fn institution_overlap(beliefs: &[Trait], traits: &[Trait]) -> usize {
    beliefs
        .iter()
        .zip(traits)
        .filter(|&(&b, &t)| t != UNSET && is_live(b) && b == t)
        .count()
}

/// `num / den` as a probability; zero when `den` is zero.
pub(crate) fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        return 0.0;
    }
    as_f64(num) / as_f64(den)
}

pub(crate) fn as_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}

/// Exactly one of homophily and selection error must fire.
pub(crate) fn fires(rng: &mut SimRng, homophily: f64, selection_error: f64) -> bool {
    let interact = unit_draw(rng) < homophily;
    let error = unit_draw(rng) < selection_error;
    interact ^ error
}

/// Uniform among `mismatches`, else uniform among all features.
pub(crate) fn choose_feature(rng: &mut SimRng, mismatches: &[usize], features: usize) -> usize {
    match mismatches.choose(rng) {
        Some(&f) => f,
        None => rng.random_range(0..features.max(1)),
    }
}

/// Uniform valid trait.
pub(crate) fn random_trait(rng: &mut SimRng, traits: usize) -> Trait {
    let upper = Trait::try_from(traits).unwrap_or(Trait::MAX).max(1);
    rng.random_range(0..upper)
}

/// With probability `params.mutation`, give one random feature of `cell` a
/// random trait. Dead slots are left alone.
pub(crate) fn mutate(world: &mut World, cell: Cell, params: &BaseParams, rng: &mut SimRng) -> bool {
    if unit_draw(rng) >= params.mutation {
        return false;
    }
    let feature = rng.random_range(0..params.features.max(1));
    let value = random_trait(rng, params.traits);
    let beliefs = world.beliefs_mut();
    let current = beliefs.trait_at(cell, feature);
    if !is_live(current) || current == value {
        return false;
    }
    beliefs.set(cell, feature, value);
    true
}

//! Flat storage of every agent's belief vector.

use rand::Rng;
use serde::{Deserialize, Serialize};

use culturesim_types::{Cell, DEAD, FOREIGN, GridShape, SimRng, Trait};

/// Belief vectors of all agents, `cell * features + feature`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeliefGrid {
    shape: GridShape,
    features: usize,
    values: Vec<Trait>,
}

// Cell and feature indices are bounded by `shape` and `features`, which are
// fixed at construction; out-of-range access is a caller bug.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
impl BeliefGrid {
    /// Every agent holds `value` in every feature.
    pub fn uniform(shape: GridShape, features: usize, value: Trait) -> Self {
        Self {
            shape,
            features,
            values: vec![value; shape.len() * features],
        }
    }

    /// Every feature of every agent drawn uniformly from `0..traits`.
    pub fn random(shape: GridShape, features: usize, traits: usize, rng: &mut SimRng) -> Self {
        let upper = Trait::try_from(traits).unwrap_or(Trait::MAX);
        let values = (0..shape.len() * features)
            .map(|_| rng.random_range(0..upper))
            .collect();
        Self {
            shape,
            features,
            values,
        }
    }

    /// Build from raw values.
    ///
    /// Returns `None` when `values` does not hold exactly one vector per cell.
    pub fn from_values(shape: GridShape, features: usize, values: Vec<Trait>) -> Option<Self> {
        (values.len() == shape.len() * features).then_some(Self {
            shape,
            features,
            values,
        })
    }

    /// Grid dimensions.
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Belief-vector length.
    pub const fn features(&self) -> usize {
        self.features
    }

    /// All values in storage order.
    pub fn values(&self) -> &[Trait] {
        &self.values
    }

    /// Belief vector of one agent.
    pub fn get(&self, cell: Cell) -> &[Trait] {
        let start = cell * self.features;
        &self.values[start..start + self.features]
    }

    /// Mutable belief vector of one agent.
    pub fn get_mut(&mut self, cell: Cell) -> &mut [Trait] {
        let start = cell * self.features;
        &mut self.values[start..start + self.features]
    }

    /// One feature of one agent.
    pub fn trait_at(&self, cell: Cell, feature: usize) -> Trait {
        self.values[cell * self.features + feature]
    }

    /// Overwrite one feature of one agent.
    pub fn set(&mut self, cell: Cell, feature: usize, value: Trait) {
        self.values[cell * self.features + feature] = value;
    }

    /// Whether every feature of the agent is [`DEAD`].
    pub fn is_wholly_dead(&self, cell: Cell) -> bool {
        self.get(cell).iter().all(|&v| v == DEAD)
    }

    /// Mark the agent dead in every feature.
    pub fn kill(&mut self, cell: Cell) {
        self.get_mut(cell).fill(DEAD);
    }

    /// Replace every feature of the agent with [`FOREIGN`].
    pub fn make_foreign(&mut self, cell: Cell) {
        self.get_mut(cell).fill(FOREIGN);
    }

    /// Whether two agents hold identical belief vectors.
    pub fn same_beliefs(&self, a: Cell, b: Cell) -> bool {
        self.get(a) == self.get(b)
    }
}

//! The aggregate state one run mutates.

use culturesim_types::{Cell, Configuration, RenderableState, SimRng};

use crate::beliefs::BeliefGrid;
use crate::error::WorldError;
use crate::institutions::InstitutionRegistry;
use crate::topology::NeighborTopology;

/// Beliefs, institutions, and neighborhoods of one grid.
///
/// The three components always describe the same [`GridShape`], and the
/// registry tracks one trait slot per belief feature.
///
/// [`GridShape`]: culturesim_types::GridShape
#[derive(Debug, Clone)]
pub struct World {
    beliefs: BeliefGrid,
    registry: InstitutionRegistry,
    topology: NeighborTopology,
    traits: usize,
}

impl World {
    /// Assemble a world from existing state, building the topology.
    ///
    /// The parts may come from a snapshot, so the belief storage size and
    /// the registry invariants are checked before anything indexes them.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ShapeMismatch`] when the parts disagree on the
    /// grid, or the first violation reported by
    /// [`InstitutionRegistry::verify`].
    pub fn new(
        beliefs: BeliefGrid,
        registry: InstitutionRegistry,
        radius: usize,
        traits: usize,
    ) -> Result<Self, WorldError> {
        if beliefs.shape() != registry.shape() {
            return Err(WorldError::ShapeMismatch {
                reason: format!(
                    "beliefs are {}x{}, institutions are {}x{}",
                    beliefs.shape().rows,
                    beliefs.shape().cols,
                    registry.shape().rows,
                    registry.shape().cols
                ),
            });
        }
        if beliefs.features() != registry.features() {
            return Err(WorldError::ShapeMismatch {
                reason: format!(
                    "beliefs carry {} features, institutions carry {}",
                    beliefs.features(),
                    registry.features()
                ),
            });
        }
        let expected = beliefs.shape().len().checked_mul(beliefs.features());
        if expected != Some(beliefs.values().len()) {
            return Err(WorldError::ShapeMismatch {
                reason: format!(
                    "beliefs hold {} values for {} cells of {} features",
                    beliefs.values().len(),
                    beliefs.shape().len(),
                    beliefs.features()
                ),
            });
        }
        registry.verify()?;
        let topology = NeighborTopology::build(beliefs.shape(), radius);
        Ok(Self {
            beliefs,
            registry,
            topology,
            traits,
        })
    }

    /// Fresh world: random beliefs, one singleton institution per agent.
    pub fn random(config: &Configuration, rng: &mut SimRng) -> Self {
        let shape = config.shape();
        let beliefs = BeliefGrid::random(shape, config.features, config.traits, rng);
        let registry = InstitutionRegistry::singletons(shape, config.features);
        let topology = NeighborTopology::build(shape, config.radius);
        tracing::debug!(
            rows = shape.rows,
            cols = shape.cols,
            radius = config.radius,
            links = topology.link_count(),
            "world initialized"
        );
        Self {
            beliefs,
            registry,
            topology,
            traits: config.traits,
        }
    }

    /// Agent beliefs.
    pub const fn beliefs(&self) -> &BeliefGrid {
        &self.beliefs
    }

    /// Mutable agent beliefs.
    pub const fn beliefs_mut(&mut self) -> &mut BeliefGrid {
        &mut self.beliefs
    }

    /// Institution registry.
    pub const fn registry(&self) -> &InstitutionRegistry {
        &self.registry
    }

    /// Mutable institution registry.
    pub const fn registry_mut(&mut self) -> &mut InstitutionRegistry {
        &mut self.registry
    }

    /// Borrow beliefs and registry mutably at once.
    pub const fn split_mut(&mut self) -> (&mut BeliefGrid, &mut InstitutionRegistry) {
        (&mut self.beliefs, &mut self.registry)
    }

    /// Neighborhood lists.
    pub const fn topology(&self) -> &NeighborTopology {
        &self.topology
    }

    /// Number of live trait values per feature.
    pub const fn traits(&self) -> usize {
        self.traits
    }

    /// Number of agents.
    pub const fn len(&self) -> usize {
        self.beliefs.shape().len()
    }

    /// Whether the grid has no agents.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Institution id of the agent at `cell`.
    pub fn institution_of(&self, cell: Cell) -> Cell {
        self.registry.institution_of(cell)
    }

    /// Read-only copy of the state for a render sink.
    pub fn render_state(&self, run_id: u64, iteration: u64) -> RenderableState {
        let institutions = (0..self.len())
            .map(|cell| self.registry.institution_of(cell))
            .collect();
        RenderableState {
            run_id,
            shape: self.beliefs.shape(),
            features: self.beliefs.features(),
            beliefs: self.beliefs.values().to_vec(),
            institutions,
            iteration,
        }
    }

    /// Give back the persistent components. The topology is derived state.
    pub fn into_parts(self) -> (BeliefGrid, InstitutionRegistry) {
        (self.beliefs, self.registry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use culturesim_types::{GridShape, seeded_rng};

    use super::*;

    #[test]
    fn random_world_matches_configuration() {
        let config = Configuration {
            rows: 6,
            cols: 4,
            features: 3,
            traits: 7,
            radius: 2,
            ..Configuration::default()
        };
        let mut rng = seeded_rng(9);
        let world = World::random(&config, &mut rng);
        assert_eq!(world.len(), 24);
        assert_eq!(world.topology().radius(), 2);
        assert_eq!(world.registry().institution_count(), 24);
        assert!(world.beliefs().values().iter().all(|v| (0..7).contains(v)));
        assert!(world.registry().verify().is_ok());
    }

    #[test]
    fn mismatched_parts_are_rejected() {
        let beliefs = BeliefGrid::uniform(GridShape::new(3, 3), 2, 0);
        let registry = InstitutionRegistry::singletons(GridShape::new(3, 4), 2);
        assert!(matches!(
            World::new(beliefs, registry, 1, 4),
            Err(WorldError::ShapeMismatch { .. })
        ));

        let beliefs = BeliefGrid::uniform(GridShape::new(3, 3), 2, 0);
        let registry = InstitutionRegistry::singletons(GridShape::new(3, 3), 3);
        assert!(World::new(beliefs, registry, 1, 4).is_err());
    }

    #[test]
    fn render_state_copies_grid() {
        let shape = GridShape::new(2, 3);
        let beliefs = BeliefGrid::uniform(shape, 2, 5);
        let registry = InstitutionRegistry::singletons(shape, 2);
        let mut world = World::new(beliefs, registry, 1, 8).unwrap();
        assert!(world.registry_mut().move_to(4, 1).is_ok());
        let state = world.render_state(3, 17);
        assert_eq!(state.run_id, 3);
        assert_eq!(state.iteration, 17);
        assert_eq!(state.beliefs.len(), 12);
        assert_eq!(state.institutions, vec![0, 1, 2, 3, 1, 5]);
    }
}

//! Axelrod homophily: no institutions, one feature copied per firing.

use culturesim_types::{Configuration, ModelKind, SimRng, is_live};
use culturesim_world::World;

use super::{
    BaseParams, InteractionRule, TickEffects, choose_feature, compare, fires, mutate, pick_pair,
    ratio,
};
use crate::error::ModelError;

/// Classic Axelrod dissemination of culture with selection error.
#[derive(Debug, Clone)]
pub struct AxelrodRule {
    params: BaseParams,
    mismatches: Vec<usize>,
}

impl AxelrodRule {
    /// Rule with the parameters of `config`.
    pub fn new(config: &Configuration) -> Self {
        Self {
            params: BaseParams::from_config(config),
            mismatches: Vec::with_capacity(config.features),
        }
    }
}

impl InteractionRule for AxelrodRule {
    fn kind(&self) -> ModelKind {
        ModelKind::Axelrod
    }

    fn apply_tick(
        &mut self,
        world: &mut World,
        rng: &mut SimRng,
    ) -> Result<TickEffects, ModelError> {
        self.params.check(world)?;
        let Some((cell, neighbor)) = pick_pair(world, rng) else {
            return Ok(TickEffects::default());
        };
        let mut effects = TickEffects::default();

        let beliefs = world.beliefs();
        let overlap = compare(beliefs.get(cell), beliefs.get(neighbor), &mut self.mismatches);
        let homophily = ratio(overlap, self.params.features);

        if fires(rng, homophily, self.params.selection_error) {
            let feature = choose_feature(rng, &self.mismatches, self.params.features);
            let current = beliefs.trait_at(cell, feature);
            let candidate = beliefs.trait_at(neighbor, feature);
            if is_live(current) && is_live(candidate) && current != candidate {
                world.beliefs_mut().set(cell, feature, candidate);
                effects.copied = true;
            }
        }

        effects.mutated = mutate(world, cell, &self.params, rng);
        Ok(effects)
    }
}

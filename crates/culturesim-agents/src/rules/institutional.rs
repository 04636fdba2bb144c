//! Institutional influence and loyalty.
//!
//! Homophily decides whether the agent listens to its neighbor. A copy that
//! would pull the agent away from a trait its own institution holds meets
//! *resistance* proportional to how aligned the agent already is with that
//! institution (`ALPHA`). After every copy the agent weighs its loyalty to
//! its own institution (`ALPHA_PRIME`) against its overlap with the
//! neighbor's institution and may switch membership.

use culturesim_types::{Cell, Configuration, ModelKind, SimRng, Trait, UNSET, is_live, unit_draw};
use culturesim_world::World;

use super::{
    BaseParams, InteractionRule, TickEffects, as_f64, choose_feature, compare, fires,
    institution_overlap, mutate, pick_pair, ratio,
};
use crate::error::ModelError;

/// Homophily with institutional resistance and switching.
#[derive(Debug, Clone)]
pub struct InstitutionalRule {
    params: BaseParams,
    alpha: f64,
    alpha_prime: f64,
    mismatches: Vec<usize>,
}

impl InstitutionalRule {
    /// Rule with the parameters of `config`.
    pub fn new(config: &Configuration) -> Self {
        Self {
            params: BaseParams::from_config(config),
            alpha: config.alpha,
            alpha_prime: config.alpha_prime,
            mismatches: Vec::with_capacity(config.features),
        }
    }

    /// Probability threshold a draw must exceed to copy against the
    /// agent's own institution.
    fn resistance_ratio(&self, own_overlap: usize, homophily: f64) -> f64 {
        let resistance = self.alpha * ratio(own_overlap, self.params.features);
        if resistance <= 0.0 {
            return 0.0;
        }
        resistance / homophily.mul_add(1.0 - self.alpha, resistance)
    }

    /// Probability of staying in the current institution.
    fn stay_probability(&self, own_overlap: usize, neighbor_overlap: usize) -> f64 {
        let loyalty = as_f64(own_overlap) * self.alpha_prime;
        let denominator = as_f64(neighbor_overlap).mul_add(1.0 - self.alpha_prime, loyalty);
        if denominator <= 0.0 {
            return 1.0;
        }
        loyalty / denominator
    }

    #[allow(clippy::too_many_arguments)]
    fn consider_switch(
        &self,
        world: &mut World,
        rng: &mut SimRng,
        cell: Cell,
        neighbor: Cell,
        feature: usize,
        value: Trait,
        overlaps: (usize, usize),
    ) -> Result<bool, ModelError> {
        let own = world.institution_of(cell);
        let destination = world.institution_of(neighbor);
        if own == destination {
            return Ok(false);
        }
        let (own_overlap, neighbor_overlap) = overlaps;
        if own_overlap == 0 && neighbor_overlap == 0 {
            return Ok(false);
        }
        if unit_draw(rng) < self.stay_probability(own_overlap, neighbor_overlap) {
            return Ok(false);
        }

        let registry = world.registry_mut();
        registry.move_to(cell, neighbor)?;
        if registry.trait_at(destination, feature) == UNSET {
            registry.set_trait(destination, feature, value);
        }
        tracing::trace!(cell, from = own, to = destination, "agent switched institution");
        Ok(true)
    }
}

impl InteractionRule for InstitutionalRule {
    fn kind(&self) -> ModelKind {
        ModelKind::Institutional
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
        let registry = world.registry();
        let own_id = registry.institution_of(cell);
        let neighbor_id = registry.institution_of(neighbor);
        let agent = beliefs.get(cell);

        let overlap = compare(agent, beliefs.get(neighbor), &mut self.mismatches);
        let mut own_overlap = institution_overlap(agent, registry.traits(own_id));
        let mut neighbor_overlap = institution_overlap(agent, registry.traits(neighbor_id));
        let homophily = ratio(overlap, self.params.features);

        if fires(rng, homophily, self.params.selection_error) {
            let feature = choose_feature(rng, &self.mismatches, self.params.features);
            let current = beliefs.trait_at(cell, feature);
            let candidate = beliefs.trait_at(neighbor, feature);
            let own_trait = registry.trait_at(own_id, feature);
            let neighbor_trait = registry.trait_at(neighbor_id, feature);

            if is_live(current) && is_live(candidate) && current != candidate {
                let conflict = own_trait != UNSET && own_trait == current;
                let copy = !conflict
                    || unit_draw(rng) > self.resistance_ratio(own_overlap, homophily);

                if copy {
                    world.beliefs_mut().set(cell, feature, candidate);
                    effects.copied = true;

                    for (slot, overlap) in [
                        (own_trait, &mut own_overlap),
                        (neighbor_trait, &mut neighbor_overlap),
                    ] {
                        if slot == UNSET {
                            continue;
                        }
                        if slot == current {
                            *overlap = overlap.saturating_sub(1);
                        }
                        if slot == candidate {
                            *overlap = overlap.saturating_add(1);
                        }
                    }

                    effects.switched = self.consider_switch(
                        world,
                        rng,
                        cell,
                        neighbor,
                        feature,
                        candidate,
                        (own_overlap, neighbor_overlap),
                    )?;
                }
            }
        }

        effects.mutated = mutate(world, cell, &self.params, rng);
        Ok(effects)
    }
}

//! Flache multilateral influence.
//!
//! The agent polls its whole neighborhood on one feature. Each live
//! neighbor votes for its own trait with weight `s*(1-SE) + (1-s)*SE`,
//! where `s` is its overlap with the agent as a fraction of all features;
//! the agent votes for its current trait with weight `1-SE`. The heaviest
//! trait wins, ties broken uniformly.

use rand::Rng;
use rand::seq::IndexedRandom;

use culturesim_types::{Configuration, ModelKind, SimRng, Trait, is_live};
use culturesim_world::World;

use super::{BaseParams, InteractionRule, TickEffects, compare, mutate, ratio};
use crate::error::ModelError;

/// Weights closer than this are treated as tied.
const TIE_TOLERANCE: f64 = 1e-12;

/// Multilateral weighted-vote rule.
#[derive(Debug, Clone)]
pub struct FlacheRule {
    params: BaseParams,
    mismatches: Vec<usize>,
    live: Vec<usize>,
    tally: Vec<(Trait, f64)>,
    winners: Vec<Trait>,
}

impl FlacheRule {
    /// Rule with the parameters of `config`.
    pub fn new(config: &Configuration) -> Self {
        Self {
            params: BaseParams::from_config(config),
            mismatches: Vec::with_capacity(config.features),
            live: Vec::with_capacity(config.features),
            tally: Vec::new(),
            winners: Vec::new(),
        }
    }

    fn vote(&mut self, value: Trait, weight: f64) {
        if let Some(entry) = self.tally.iter_mut().find(|(t, _)| *t == value) {
            entry.1 += weight;
        } else {
            self.tally.push((value, weight));
        }
    }
}

impl InteractionRule for FlacheRule {
    fn kind(&self) -> ModelKind {
        ModelKind::Flache
    }

    fn apply_tick(
        &mut self,
        world: &mut World,
        rng: &mut SimRng,
    ) -> Result<TickEffects, ModelError> {
        self.params.check(world)?;
        let len = world.len();
        if len == 0 {
            return Ok(TickEffects::default());
        }
        let cell = rng.random_range(0..len);
        let mut effects = TickEffects::default();

        let beliefs = world.beliefs();
        let own = beliefs.get(cell);
        self.live.clear();
        self.live
            .extend(own.iter().enumerate().filter(|(_, v)| is_live(**v)).map(|(f, _)| f));
        let Some(&feature) = self.live.choose(rng) else {
            return Ok(TickEffects::default());
        };
        let current = beliefs.trait_at(cell, feature);
        let se = self.params.selection_error;

        self.tally.clear();
        self.vote(current, 1.0 - se);
        for &neighbor in world.topology().neighbors(cell) {
            let value = beliefs.trait_at(neighbor, feature);
            if !is_live(value) {
                continue;
            }
            let overlap = compare(own, beliefs.get(neighbor), &mut self.mismatches);
            let s = ratio(overlap, self.params.features);
            self.vote(value, s.mul_add(1.0 - se, (1.0 - s) * se));
        }

        let best = self
            .tally
            .iter()
            .map(|&(_, w)| w)
            .fold(f64::NEG_INFINITY, f64::max);
        self.winners.clear();
        self.winners.extend(
            self.tally
                .iter()
                .filter(|&&(_, w)| (best - w).abs() <= TIE_TOLERANCE)
                .map(|&(t, _)| t),
        );
        let chosen = self.winners.choose(rng).copied().unwrap_or(current);

        if chosen != current {
            world.beliefs_mut().set(cell, feature, chosen);
            effects.copied = true;
        }

        effects.mutated = mutate(world, cell, &self.params, rng);
        Ok(effects)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use culturesim_types::{DEAD, GridShape, seeded_rng};
    use culturesim_world::{BeliefGrid, InstitutionRegistry};

    use super::*;

    fn config(selection_error: f64) -> Configuration {
        Configuration {
            model: ModelKind::Flache,
            rows: 1,
            cols: 3,
            features: 2,
            traits: 5,
            mutation: 0.0,
            selection_error,
            ..Configuration::default()
        }
    }

    fn world(values: Vec<Trait>) -> World {
        let shape = GridShape::new(1, 3);
        let beliefs = BeliefGrid::from_values(shape, 2, values).unwrap();
        World::new(beliefs, InstitutionRegistry::singletons(shape, 2), 1, 5).unwrap()
    }

    #[test]
    fn majority_pulls_the_middle_agent() {
        // The outer agents together tie the middle agent's own vote on
        // feature 0; once it adopts 3 it outweighs any dissent.
        let mut world = world(vec![3, 1, 4, 1, 3, 1]);
        let mut rule = FlacheRule::new(&config(0.0));
        let mut rng = seeded_rng(21);
        for _ in 0..300 {
            assert!(rule.apply_tick(&mut world, &mut rng).is_ok());
        }
        assert_eq!(world.beliefs().get(1), &[3, 1]);
    }

    #[test]
    fn dead_agent_has_no_live_feature() {
        let mut world = world(vec![DEAD, DEAD, DEAD, DEAD, DEAD, DEAD]);
        let mut rule = FlacheRule::new(&config(0.2));
        let mut rng = seeded_rng(2);
        for _ in 0..50 {
            assert_eq!(rule.apply_tick(&mut world, &mut rng), Ok(TickEffects::default()));
        }
    }

    #[test]
    fn uniform_world_is_stable() {
        let mut world = world(vec![2, 2, 2, 2, 2, 2]);
        let mut rule = FlacheRule::new(&config(0.3));
        let mut rng = seeded_rng(8);
        for _ in 0..100 {
            assert!(rule.apply_tick(&mut world, &mut rng).is_ok());
        }
        assert!(world.beliefs().values().iter().all(|&v| v == 2));
    }
}

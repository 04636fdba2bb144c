//! Periodic processes that run inside every institution.
//!
//! # Democracy
//!
//! Members vote their current traits feature by feature. For each feature
//! the most-voted trait (ties broken uniformly) replaces the institution's
//! trait when it beats the incumbent by a strictly positive margin, or when
//! the institution has no trait recorded for that feature.
//!
//! # Propaganda
//!
//! The institution pushes each recorded trait onto every member holding a
//! different live value. A member accepts each push independently with
//! probability `1 - mismatch_ratio`, where `mismatch_ratio` is the fraction
//! of features on which it disagreed with the institution before the
//! broadcast.
//!
//! Both processes visit each member exactly once via the circular list.
//! [`DEAD`] slots neither vote nor receive propaganda.

use rand::seq::IndexedRandom;

use culturesim_types::{Cell, DEAD, FOREIGN, SimRng, Trait, UNSET, is_live, unit_draw};
use culturesim_world::World;

use crate::rules::ratio;

/// Vote buffers and scratch lists, allocated once per run.
#[derive(Debug, Clone)]
pub struct CollectiveProcesses {
    features: usize,
    traits: usize,
    /// `feature * (traits + 1) + slot`; slot `traits` counts [`FOREIGN`].
    votes: Vec<u32>,
    winners: Vec<usize>,
    institutions: Vec<Cell>,
}

// `votes` is sized `features * (traits + 1)` and slots come from
// `slot_of`, which never exceeds `traits`.
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
impl CollectiveProcesses {
    /// Buffers for `features` features of `traits` values each.
    pub fn new(features: usize, traits: usize) -> Self {
        Self {
            features,
            traits,
            votes: vec![0; features.saturating_mul(traits.saturating_add(1))],
            winners: Vec::with_capacity(traits.saturating_add(1)),
            institutions: Vec::new(),
        }
    }

    fn slot_of(&self, value: Trait) -> Option<usize> {
        if value == FOREIGN {
            return Some(self.traits);
        }
        usize::try_from(value).ok().filter(|&v| v < self.traits)
    }

    fn trait_of(&self, slot: usize) -> Trait {
        if slot == self.traits {
            FOREIGN
        } else {
            Trait::try_from(slot).unwrap_or(DEAD)
        }
    }

    /// Run one democracy round over every live institution.
    ///
    /// Returns the number of institution traits that changed.
    pub fn democracy(&mut self, world: &mut World, rng: &mut SimRng) -> u64 {
        let width = self.traits + 1;
        let mut changed: u64 = 0;
        self.institutions.clear();
        self.institutions.extend(world.registry().live_institutions());

        for index in 0..self.institutions.len() {
            let id = self.institutions[index];
            self.votes.fill(0);
            for member in world.registry().members(id) {
                for (feature, &value) in world.beliefs().get(member).iter().enumerate() {
                    if let Some(slot) = self.slot_of(value) {
                        self.votes[feature * width + slot] += 1;
                    }
                }
            }

            for feature in 0..self.features {
                let row = &self.votes[feature * width..(feature + 1) * width];
                let best = row.iter().copied().max().unwrap_or(0);
                if best == 0 {
                    continue;
                }
                let incumbent = world.registry().trait_at(id, feature);
                let incumbent_votes = self.slot_of(incumbent).map_or(0, |s| row[s]);
                if incumbent != UNSET && best <= incumbent_votes {
                    continue;
                }
                self.winners.clear();
                self.winners
                    .extend(row.iter().enumerate().filter(|(_, v)| **v == best).map(|(s, _)| s));
                let Some(&slot) = self.winners.choose(rng) else {
                    continue;
                };
                let winner = self.trait_of(slot);
                if winner != incumbent {
                    world.registry_mut().set_trait(id, feature, winner);
                    changed += 1;
                }
            }
        }

        tracing::debug!(institutions = self.institutions.len(), changed, "democracy round");
        changed
    }

    /// Run one propaganda broadcast from every live institution.
    ///
    /// Returns the number of member beliefs overwritten.
    pub fn propaganda(&mut self, world: &mut World, rng: &mut SimRng) -> u64 {
        let mut changed: u64 = 0;
        self.institutions.clear();
        self.institutions.extend(world.registry().live_institutions());
        let (beliefs, registry) = world.split_mut();

        for &id in &self.institutions {
            let traits = registry.traits(id);
            for member in registry.members(id) {
                let values = beliefs.get_mut(member);
                let differing = values
                    .iter()
                    .zip(traits)
                    .filter(|&(&v, &t)| t != UNSET && is_live(v) && v != t)
                    .count();
                if differing == 0 {
                    continue;
                }
                let accept = 1.0 - ratio(differing, self.features);
                for (value, &t) in values.iter_mut().zip(traits) {
                    if t == UNSET || !is_live(*value) || *value == t {
                        continue;
                    }
                    if unit_draw(rng) < accept {
                        *value = t;
                        changed += 1;
                    }
                }
            }
        }

        tracing::debug!(institutions = self.institutions.len(), changed, "propaganda round");
        changed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use culturesim_types::{GridShape, seeded_rng};
    use culturesim_world::{BeliefGrid, InstitutionRegistry};

    use super::*;

    /// Four agents in one institution, beliefs given per agent.
    fn one_institution(values: [[Trait; 2]; 4]) -> World {
        let shape = GridShape::new(2, 2);
        let beliefs = BeliefGrid::from_values(shape, 2, values.concat()).unwrap();
        let mut registry = InstitutionRegistry::singletons(shape, 2);
        for cell in 1..4 {
            registry.move_to(cell, 0).unwrap();
        }
        World::new(beliefs, registry, 1, 4).unwrap()
    }

    #[test]
    fn democracy_fills_unset_traits_with_majority() {
        let mut world = one_institution([[1, 2], [1, 3], [1, 3], [0, 3]]);
        let mut processes = CollectiveProcesses::new(2, 4);
        let mut rng = seeded_rng(1);
        assert_eq!(processes.democracy(&mut world, &mut rng), 2);
        assert_eq!(world.registry().traits(0), &[1, 3]);
        assert_eq!(processes.democracy(&mut world, &mut rng), 0);
    }

    #[test]
    fn democracy_keeps_incumbent_on_tie() {
        let mut world = one_institution([[0, 1], [0, 1], [2, 1], [2, 1]]);
        world.registry_mut().set_trait(0, 0, 2);
        world.registry_mut().set_trait(0, 1, 1);
        let mut processes = CollectiveProcesses::new(2, 4);
        let mut rng = seeded_rng(2);
        assert_eq!(processes.democracy(&mut world, &mut rng), 0);
        assert_eq!(world.registry().traits(0), &[2, 1]);
    }

    #[test]
    fn democracy_counts_foreign_and_ignores_dead() {
        let mut world = one_institution([
            [FOREIGN, DEAD],
            [FOREIGN, DEAD],
            [0, DEAD],
            [DEAD, DEAD],
        ]);
        let mut processes = CollectiveProcesses::new(2, 4);
        let mut rng = seeded_rng(3);
        assert_eq!(processes.democracy(&mut world, &mut rng), 1);
        assert_eq!(world.registry().traits(0), &[FOREIGN, UNSET]);
    }

    #[test]
    fn propaganda_converts_agreeing_members() {
        // Every member disagrees on exactly one of two features, so each
        // push is accepted with probability one half; enough rounds make
        // everyone conform.
        let mut world = one_institution([[0, 1], [3, 1], [0, 2], [0, 1]]);
        world.registry_mut().set_trait(0, 0, 0);
        world.registry_mut().set_trait(0, 1, 1);
        let mut processes = CollectiveProcesses::new(2, 4);
        let mut rng = seeded_rng(4);
        let mut total = 0;
        for _ in 0..64 {
            total += processes.propaganda(&mut world, &mut rng);
        }
        assert_eq!(total, 2);
        assert!(world.beliefs().values().chunks(2).all(|v| v == [0, 1]));
    }

    #[test]
    fn propaganda_skips_unset_and_dead() {
        let mut world = one_institution([[DEAD, 1], [2, 2], [3, 3], [0, 0]]);
        world.registry_mut().set_trait(0, 0, 1);
        let mut processes = CollectiveProcesses::new(2, 4);
        let mut rng = seeded_rng(5);
        for _ in 0..64 {
            processes.propaganda(&mut world, &mut rng);
        }
        let beliefs = world.beliefs();
        assert_eq!(beliefs.trait_at(0, 0), DEAD);
        assert_eq!(beliefs.get(1)[1], 2);
        assert_eq!(beliefs.get(2)[1], 3);
    }
}

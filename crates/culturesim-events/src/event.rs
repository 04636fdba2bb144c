//! Event kinds and their execution against a world.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

use culturesim_types::{Cell, FOREIGN, SimRng, seeded_rng, unit_draw};
use culturesim_world::World;

use crate::distribution::Distribution;
use crate::error::EventError;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// What happens to a cell the distribution triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The agent dies: every feature becomes `DEAD`.
    Decimation,
    /// The agent is replaced by a settler holding only foreign traits.
    /// Settlers of one execution share one freshly founded, wholly foreign
    /// institution.
    Settlement,
    /// The agent adopts foreign traits but keeps its institution.
    Immigration,
    /// The agent's institution forgets every trait.
    InstitutionDestroy,
    /// Each trait of the agent's institution turns foreign with the cell's
    /// trigger probability.
    ConvertPartial,
    /// Every trait of the agent's institution turns foreign.
    ConvertFull,
}

impl EventKind {
    /// Mini-language letter.
    pub const fn letter(self) -> char {
        match self {
            Self::Decimation => 'D',
            Self::Settlement => 'S',
            Self::Immigration => 'M',
            Self::InstitutionDestroy => 'X',
            Self::ConvertPartial => 'P',
            Self::ConvertFull => 'C',
        }
    }

    /// Kind for a mini-language letter, case-insensitive.
    pub const fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'D' => Some(Self::Decimation),
            'S' => Some(Self::Settlement),
            'M' => Some(Self::Immigration),
            'X' => Some(Self::InstitutionDestroy),
            'P' => Some(Self::ConvertPartial),
            'C' => Some(Self::ConvertFull),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A scheduled perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Effect on triggered cells.
    pub kind: EventKind,
    /// Per-cell trigger probability.
    pub distribution: Distribution,
    /// Earliest iteration at which the event applies; `None` means the
    /// first checkpoint boundary of the run.
    pub at: Option<u64>,
}

/// Result of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    /// Seed of the execution's private generator.
    pub seed: u64,
    /// Number of triggered cells.
    pub affected: u64,
}

impl Event {
    /// Whether the event should fire at a boundary after `iteration`
    /// completed iterations.
    pub fn is_due(&self, iteration: u64) -> bool {
        self.at.is_none_or(|at| iteration >= at)
    }

    /// Draw a seed from `rng` and execute with it.
    pub fn execute(&self, world: &mut World, rng: &mut SimRng) -> Result<EventOutcome, EventError> {
        let seed = rng.random::<u64>();
        let affected = self.execute_with_seed(world, seed)?;
        Ok(EventOutcome { seed, affected })
    }

    /// Execute on a generator seeded with `seed`, returning the number of
    /// triggered cells.
    pub fn execute_with_seed(&self, world: &mut World, seed: u64) -> Result<u64, EventError> {
        let mut rng = seeded_rng(seed);
        let probabilities = self.distribution.probabilities(world.beliefs().shape());
        let mut settlement: Option<Cell> = None;
        let mut affected: u64 = 0;

        for (cell, &p) in probabilities.iter().enumerate() {
            if unit_draw(&mut rng) >= p {
                continue;
            }
            affected = affected.saturating_add(1);
            self.apply(world, cell, p, &mut rng, &mut settlement)?;
        }
        tracing::debug!(event = %self, seed, affected, "event executed");
        Ok(affected)
    }

    fn apply(
        &self,
        world: &mut World,
        cell: Cell,
        p: f64,
        rng: &mut SimRng,
        settlement: &mut Option<Cell>,
    ) -> Result<(), EventError> {
        match self.kind {
            EventKind::Decimation => world.beliefs_mut().kill(cell),
            EventKind::Immigration => world.beliefs_mut().make_foreign(cell),
            EventKind::Settlement => {
                world.beliefs_mut().make_foreign(cell);
                let registry = world.registry_mut();
                match *settlement {
                    Some(founder) => registry.move_to(cell, founder)?,
                    None => {
                        let id = registry.abandon(cell)?;
                        registry.fill_traits(id, FOREIGN);
                        *settlement = Some(cell);
                    }
                }
            }
            EventKind::InstitutionDestroy => {
                let id = world.institution_of(cell);
                world.registry_mut().clear_traits(id);
            }
            EventKind::ConvertPartial => {
                let id = world.institution_of(cell);
                let features = world.registry().features();
                let registry = world.registry_mut();
                for feature in 0..features {
                    if unit_draw(rng) < p {
                        registry.set_trait(id, feature, FOREIGN);
                    }
                }
            }
            EventKind::ConvertFull => {
                let id = world.institution_of(cell);
                world.registry_mut().fill_traits(id, FOREIGN);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind.letter(), self.distribution)?;
        if let Some(at) = self.at {
            write!(f, "#{at}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use culturesim_types::{Configuration, DEAD, GridShape, UNSET};
    use culturesim_world::{BeliefGrid, InstitutionRegistry};

    use super::*;

    fn world() -> World {
        let shape = GridShape::new(4, 4);
        World::new(
            BeliefGrid::uniform(shape, 3, 1),
            InstitutionRegistry::singletons(shape, 3),
            1,
            5,
        )
        .unwrap()
    }

    fn event(kind: EventKind, distribution: Distribution) -> Event {
        Event {
            kind,
            distribution,
            at: None,
        }
    }

    #[test]
    fn certain_decimation_kills_everyone() {
        let mut world = world();
        let e = event(EventKind::Decimation, Distribution::Uniform { p: 1.0 });
        assert_eq!(e.execute_with_seed(&mut world, 1).unwrap(), 16);
        assert!(world.beliefs().values().iter().all(|&v| v == DEAD));
    }

    #[test]
    fn impossible_decimation_changes_nothing() {
        let mut world = world();
        let before = world.beliefs().clone();
        let e = event(EventKind::Decimation, Distribution::Uniform { p: 0.0 });
        assert_eq!(e.execute_with_seed(&mut world, 1).unwrap(), 0);
        assert_eq!(world.beliefs(), &before);
    }

    #[test]
    fn settlers_share_one_foreign_institution() {
        let mut world = world();
        let e = event(
            EventKind::Settlement,
            Distribution::Rect {
                r1: 0,
                c1: 0,
                r2: 1,
                c2: 1,
            },
        );
        assert_eq!(e.execute_with_seed(&mut world, 3).unwrap(), 4);
        let id = world.institution_of(0);
        for cell in [0, 1, 4, 5] {
            assert_eq!(world.institution_of(cell), id);
            assert!(world.beliefs().get(cell).iter().all(|&v| v == FOREIGN));
        }
        assert_eq!(world.registry().member_count(id), 4);
        assert!(world.registry().traits(id).iter().all(|&t| t == FOREIGN));
        world.registry().verify().unwrap();
    }

    #[test]
    fn destroy_and_convert_touch_institutions_only() {
        let mut world = world();
        world.registry_mut().fill_traits(5, 2);
        let destroy = event(
            EventKind::InstitutionDestroy,
            Distribution::Rect {
                r1: 1,
                c1: 1,
                r2: 1,
                c2: 1,
            },
        );
        assert_eq!(destroy.execute_with_seed(&mut world, 0).unwrap(), 1);
        assert!(world.registry().traits(5).iter().all(|&t| t == UNSET));

        let convert = event(EventKind::ConvertFull, Distribution::Uniform { p: 1.0 });
        convert.execute_with_seed(&mut world, 0).unwrap();
        assert!(world.registry().traits(9).iter().all(|&t| t == FOREIGN));
        assert!(world.beliefs().values().iter().all(|&v| v == 1));
    }

    #[test]
    fn execution_replays_from_its_seed() {
        let config = Configuration {
            rows: 10,
            cols: 10,
            ..Configuration::default()
        };
        let mut rng = culturesim_types::seeded_rng(4);
        let base = World::random(&config, &mut rng);
        let e = event(EventKind::Immigration, Distribution::Uniform { p: 0.3 });

        let mut first = base.clone();
        let outcome = e.execute(&mut first, &mut rng).unwrap();
        let mut replay = base;
        assert_eq!(e.execute_with_seed(&mut replay, outcome.seed).unwrap(), outcome.affected);
        assert_eq!(first.beliefs(), replay.beliefs());
    }

    #[test]
    fn scheduling() {
        let mut e = event(EventKind::Decimation, Distribution::Uniform { p: 0.5 });
        assert!(e.is_due(0));
        e.at = Some(100);
        assert!(!e.is_due(99));
        assert!(e.is_due(100));
        assert_eq!(e.to_string(), "D@U,0.5#100");
    }

    #[test]
    fn stored_form_is_tagged() {
        let e: Event = "X@R,0,0,1,2#7".parse().unwrap();
        let json = serde_json::to_value(e).unwrap();
        assert_eq!(json["kind"], "institution_destroy");
        assert_eq!(json["distribution"]["type"], "rect");
        assert_eq!(json["at"], 7);
    }
}

//! Event scenarios on randomly initialized worlds.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

use culturesim_events::{Distribution, Event, EventKind, parse_event_list};
use culturesim_types::{Configuration, DEAD, FOREIGN, seeded_rng};
use culturesim_world::World;

fn random_world(seed: u64) -> World {
    let config = Configuration {
        rows: 20,
        cols: 20,
        features: 4,
        traits: 6,
        ..Configuration::default()
    };
    World::random(&config, &mut seeded_rng(seed))
}

#[test]
fn decimation_with_certainty_kills_every_agent() {
    let mut world = random_world(1);
    let mut rng = seeded_rng(2);
    let event: Event = "D@U,1".parse().unwrap();
    let outcome = event.execute(&mut world, &mut rng).unwrap();
    assert_eq!(outcome.affected, 400);
    assert!((0..400).all(|cell| world.beliefs().is_wholly_dead(cell)));
}

#[test]
fn decimation_with_zero_probability_is_a_no_op() {
    let mut world = random_world(1);
    let before = world.clone();
    let mut rng = seeded_rng(2);
    let event: Event = "D@U,0".parse().unwrap();
    assert_eq!(event.execute(&mut world, &mut rng).unwrap().affected, 0);
    assert_eq!(world.beliefs(), before.beliefs());
    assert_eq!(world.registry(), before.registry());
}

#[test]
fn expected_distribution_hits_roughly_the_requested_share() {
    let mut world = random_world(3);
    let mut rng = seeded_rng(4);
    let event = Event {
        kind: EventKind::Immigration,
        distribution: Distribution::Expected {
            row_ratio: 0.5,
            col_ratio: 0.5,
            ceil: 1.0,
            expected: 0.25,
        },
        at: None,
    };
    let affected = event.execute(&mut world, &mut rng).unwrap().affected;
    assert!((60..=140).contains(&affected), "affected {affected}");
    let foreign = world.beliefs().values().iter().filter(|&&v| v == FOREIGN).count();
    assert_eq!(foreign as u64, affected * 4);
}

#[test]
fn repeated_settlements_keep_membership_consistent() {
    let mut world = random_world(5);
    let mut rng = seeded_rng(6);
    let events = parse_event_list("S@U,0.2;S@W,0.3,0.7,4;S@N,0.9,0.1,1,3;D@U,0.1").unwrap();
    for event in &events {
        event.execute(&mut world, &mut rng).unwrap();
        world.registry().verify().unwrap();
    }
    assert!(world.beliefs().values().iter().any(|&v| v == DEAD));
    assert!(world.registry().institution_count() < 400);
}

//! Randomized membership churn against the institution arena.
//!
//! Every step either abandons or moves a random agent, then the arena is
//! checked for count conservation, cycle integrity, and anchor validity.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use culturesim_types::{GridShape, UNSET, seeded_rng};
use culturesim_world::InstitutionRegistry;
use rand::Rng;

fn churn(shape: GridShape, steps: usize, seed: u64) {
    let mut rng = seeded_rng(seed);
    let mut reg = InstitutionRegistry::singletons(shape, 2);
    let len = shape.len();

    for _ in 0..steps {
        let cell = rng.random_range(0..len);
        if rng.random_bool(0.3) {
            let id = reg.abandon(cell).unwrap();
            assert_eq!(reg.institution_of(cell), id);
            assert_eq!(reg.member_count(id), 1);
            assert!(reg.traits(id).iter().all(|&t| t == UNSET));
        } else {
            let other = rng.random_range(0..len);
            let destination = reg.institution_of(other);
            reg.move_to(cell, other).unwrap();
            assert_eq!(reg.institution_of(cell), destination);
        }
        reg.verify().unwrap();
    }

    let total: u64 = reg
        .live_institutions()
        .map(|id| u64::from(reg.member_count(id)))
        .sum();
    assert_eq!(total, len as u64);
    for id in reg.live_institutions() {
        assert!(reg.members(id).all(|m| reg.institution_of(m) == id));
        assert_eq!(reg.members(id).count(), reg.member_count(id) as usize);
    }
}

#[test]
fn churn_small_grid() {
    churn(GridShape::new(4, 4), 2_000, 1);
}

#[test]
fn churn_rectangular_grid() {
    churn(GridShape::new(3, 11), 5_000, 7);
}

#[test]
fn churn_single_row() {
    churn(GridShape::new(1, 9), 1_000, 99);
}

#[test]
fn everyone_joins_one_institution_then_leaves() {
    let shape = GridShape::new(5, 5);
    let mut reg = InstitutionRegistry::singletons(shape, 1);
    for cell in 1..25 {
        reg.move_to(cell, 0).unwrap();
    }
    assert_eq!(reg.institution_count(), 1);
    assert_eq!(reg.largest_institution(), 25);
    reg.verify().unwrap();

    for cell in 0..25 {
        reg.abandon(cell).unwrap();
        reg.verify().unwrap();
    }
    assert_eq!(reg.institution_count(), 25);
    assert_eq!(reg.largest_institution(), 1);
}

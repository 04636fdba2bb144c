//! The random number generator shared by every run.
//!
//! Runs must be bit-reproducible from their seed and resumable from a
//! snapshot, so the generator is a seeded `ChaCha8Rng` whose full state
//! serializes with serde.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Generator used by runs, interaction rules, and event executions.
pub type SimRng = ChaCha8Rng;

/// Build a generator from a `u64` seed.
pub fn seeded_rng(seed: u64) -> SimRng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Uniform draw in `[0, 1)`.
pub fn unit_draw(rng: &mut SimRng) -> f64 {
    rng.random::<f64>()
}

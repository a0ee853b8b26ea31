//! Randomized acceptance check between a hidden graph and a candidate.
//!
//! Both graphs are walked in lockstep with the same random doors, and the
//! labels seen are compared at every step. The second pass also injects the
//! same random mark into both walks every `mark_interval` steps, which exposes
//! rooms that only differ in identity, not in label.
//!
//! This is a bounded test, not a proof of isomorphism: two graphs that behave
//! identically on every walk drawn so far are accepted even if they would
//! diverge on a longer one. The false-accept probability shrinks with
//! `walk_len`; callers that need certainty must not rely on this check alone.

use crate::graph::{Graph, NUM_DOORS, NUM_LABELS};
use rand::Rng;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EquivalenceConfig {
    /// Steps per pass.
    pub walk_len: usize,
    /// Steps between marks in the second pass; 0 disables marking.
    pub mark_interval: usize,
}

impl Default for EquivalenceConfig {
    fn default() -> Self {
        Self {
            walk_len: 100_000,
            mark_interval: 10,
        }
    }
}

/// [`is_same_with`] using the default walk parameters and thread-local randomness.
pub fn is_same(a: &Graph, b: &Graph) -> bool {
    is_same_with(a, b, &EquivalenceConfig::default(), &mut rand::rng())
}

pub fn is_same_with<R: Rng + ?Sized>(
    a: &Graph,
    b: &Graph,
    config: &EquivalenceConfig,
    rng: &mut R,
) -> bool {
    if a.num_rooms() != b.num_rooms() {
        debug!(a = a.num_rooms(), b = b.num_rooms(), "room counts differ");
        return false;
    }
    for pass in 0..2 {
        let marking = pass > 0 && config.mark_interval > 0;
        let mut labels_a = a.labels();
        let mut labels_b = b.labels();
        let mut u = a.start_room();
        let mut v = b.start_room();
        for step in 0..config.walk_len {
            if labels_a[u] != labels_b[v] {
                debug!(pass, step, a = labels_a[u], b = labels_b[v], "labels differ");
                return false;
            }
            if marking && step % config.mark_interval == 0 {
                let label = rng.random_range(0..NUM_LABELS);
                labels_a[u] = label;
                labels_b[v] = label;
            }
            let door = rng.random_range(0..NUM_DOORS);
            u = a.link(u, door).room;
            v = b.link(v, door).room;
        }
    }
    true
}

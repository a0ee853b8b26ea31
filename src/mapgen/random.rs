//! # Random Map Generation
//!
//! Builds hidden graphs the way the contest does: a uniformly random perfect
//! matching over all `6 * base_size` doors, rejected until connected. Layered
//! problems copy the base graph once per layer and then swap targets between
//! corresponding doors of adjacent layers, which interleaves the copies while
//! keeping only four distinct labels.

use crate::error::{Error, Result};
use crate::graph::{DoorRef, Graph, NUM_DOORS, NUM_LABELS, Room};
use crate::problems;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorConfig {
    /// Chance that a door pair is cross-linked with the next layer.
    pub swap_probability: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            swap_probability: 0.2,
        }
    }
}

/// Generates a connected graph with `base_size * layers` rooms.
///
/// # Arguments
/// * `seed` - An optional seed for the random number generator for reproducibility.
pub fn generate(base_size: usize, layers: usize, seed: Option<u64>) -> Result<Graph> {
    let mut rng = match seed {
        Some(s) => rand::rngs::StdRng::seed_from_u64(s),
        None => rand::rngs::StdRng::from_os_rng(),
    };
    generate_with(base_size, layers, &GeneratorConfig::default(), &mut rng)
}

/// Generates the hidden graph of a named problem.
pub fn generate_problem<R: Rng + ?Sized>(
    problem_name: &str,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Graph> {
    let p = problems::get_problem(problem_name)
        .ok_or_else(|| Error::UnknownProblem(problem_name.to_string()))?;
    generate_with(p.base_size, p.layers, config, rng)
}

/// Every candidate is checked with [`Graph::new`] and for connectivity;
/// rejected candidates are regenerated from scratch.
pub fn generate_with<R: Rng + ?Sized>(
    base_size: usize,
    layers: usize,
    config: &GeneratorConfig,
    rng: &mut R,
) -> Result<Graph> {
    if base_size == 0 || layers == 0 {
        return Err(Error::InvalidMap(format!(
            "cannot generate {} layers of {} rooms",
            layers, base_size
        )));
    }
    let mut attempts = 0;
    loop {
        attempts += 1;
        let base = random_matching(base_size, rng)?;
        if !base.is_connected() {
            continue;
        }
        if layers == 1 {
            debug!(attempts, base_size, "generated graph");
            return Ok(base);
        }
        match interleave_layers(&base, layers, config.swap_probability, rng) {
            Ok(graph) if graph.is_connected() => {
                debug!(attempts, base_size, layers, "generated layered graph");
                return Ok(graph);
            }
            Ok(_) => {}
            Err(e) => warn!(attempts, error = %e, "rejected layered graph"),
        }
    }
}

/// Pairs doors until none is left. The first unmatched door is always one side
/// of the pair; the other is drawn uniformly from the remaining doors,
/// including itself.
fn random_matching<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<Graph> {
    let mut unmatched = (0..n)
        .flat_map(|r| (0..NUM_DOORS).map(move |d| DoorRef::new(r, d)))
        .collect::<Vec<_>>();
    unmatched.shuffle(rng);

    let mut links = vec![[DoorRef::new(0, 0); NUM_DOORS]; n];
    while !unmatched.is_empty() {
        let k = rng.random_range(0..unmatched.len());
        let b = unmatched.swap_remove(k);
        let a = if k == 0 { b } else { unmatched.swap_remove(0) };
        links[a.room][a.door] = b;
        links[b.room][b.door] = a;
    }

    let rooms = links
        .into_iter()
        .enumerate()
        .map(|(i, links)| Room {
            label: (i % NUM_LABELS as usize) as u8,
            links,
        })
        .collect();
    Graph::new(rooms, 0)
}

/// Copies `base` once per layer, then crosses the pairings of door `d` in
/// room `i` and door `d` in room `i + n` with probability `swap_probability`.
fn interleave_layers<R: Rng + ?Sized>(
    base: &Graph,
    layers: usize,
    swap_probability: f64,
    rng: &mut R,
) -> Result<Graph> {
    let n = base.num_rooms();
    let total = n * layers;
    let mut rooms = Vec::with_capacity(total);
    for k in 0..layers {
        for room in base.rooms() {
            let mut room = room.clone();
            for to in room.links.iter_mut() {
                to.room += k * n;
            }
            rooms.push(room);
        }
    }

    for i1 in 0..total {
        let i2 = (i1 + n) % total;
        for door in 0..NUM_DOORS {
            if rng.random::<f64>() >= swap_probability {
                continue;
            }
            let a = DoorRef::new(i1, door);
            let b = DoorRef::new(i2, door);
            let to_a = rooms[i1].links[door];
            let to_b = rooms[i2].links[door];
            // Pairs sharing a door (self-pairings, or a and b paired with each
            // other) cannot be crossed.
            if to_a == a || to_a == b || to_b == a || to_b == b {
                continue;
            }
            debug_assert_eq!(to_a.door, to_b.door);
            rooms[a.room].links[a.door] = to_b;
            rooms[to_b.room].links[to_b.door] = a;
            rooms[b.room].links[b.door] = to_a;
            rooms[to_a.room].links[to_a.door] = b;
        }
    }
    Graph::new(rooms, 0)
}

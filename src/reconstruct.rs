//! # Active reconstruction with marks
//!
//! Rebuilds the hidden graph from oracle queries alone.
//!
//! 1. **Identity discovery.** One random walk of `6n` doors is explored. For
//!    the earliest position whose room is still unknown, the same walk is
//!    explored again with a mark inserted right there. Every position whose
//!    label changed is a later visit to that same room. Rooms get a fine
//!    identity `counter * 4 + label`, unique across the four label buckets,
//!    and the scan stops as soon as all `n` rooms are known.
//! 2. **Edge discovery.** The walk is cut right after the last first sighting.
//!    Each round appends a fresh random suffix and, in one batch, explores the
//!    walk itself plus one probe per room marked at the room's first sighting.
//!    The probes label every position of the suffix, which reveals one
//!    `(room, door) -> room` edge per step. Rounds repeat until all `6n` doors
//!    are known; nothing bounds their number unless `max_rounds` is set.
//! 3. **Pairing.** Each door is matched with an unclaimed door on the target
//!    room that leads back.

use crate::error::{Error, Result};
use crate::graph::{DoorRef, Graph, NUM_DOORS, NUM_LABELS, Room};
use crate::judge::Judge;
use crate::plan::Plan;
use rand::Rng;
use tracing::{debug, info, warn};

const UNKNOWN: usize = !0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconstructConfig {
    /// The first sighting of the last room must happen within this fraction of
    /// the `6n` walk, otherwise the walk is deemed uninformative.
    pub max_prefix_ratio: f64,
    /// Edge discovery rounds per attempt; unbounded when `None`.
    pub max_rounds: Option<usize>,
    /// Reconstruction attempts in [`solve`]; unbounded when `None`.
    pub max_attempts: Option<usize>,
}

impl Default for ReconstructConfig {
    fn default() -> Self {
        Self {
            max_prefix_ratio: 0.75,
            max_rounds: None,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Identity {
    /// `counter * 4 + label`.
    fine: usize,
    /// Trace position of the first sighting.
    first_seen: usize,
}

impl Identity {
    fn label(&self) -> u8 {
        (self.fine % NUM_LABELS as usize) as u8
    }
}

/// Any label other than the observed one works as a mark.
fn mark_label(observed: u8) -> u8 {
    if observed == 0 { 1 } else { 0 }
}

/// Explores and checks the shape of every trace, so later indexing is safe.
fn explore_checked<J: Judge + ?Sized>(judge: &mut J, plans: &[Plan]) -> Result<Vec<Vec<u8>>> {
    let traces = judge.explore(plans)?;
    if traces.len() != plans.len() {
        return Err(Error::InconsistentGraph(format!(
            "{} traces for {} plans",
            traces.len(),
            plans.len()
        )));
    }
    for (plan, trace) in plans.iter().zip(&traces) {
        if trace.len() != plan.len() + 1 {
            return Err(Error::InconsistentGraph(format!(
                "trace of length {} for a plan of length {}",
                trace.len(),
                plan.len()
            )));
        }
        if let Some(&l) = trace.iter().find(|&&l| l >= NUM_LABELS) {
            return Err(Error::InconsistentGraph(format!("label {} observed", l)));
        }
    }
    Ok(traces)
}

/// Positions of `base` that belong to the room marked at `pos`: the ones whose
/// label changed in `probe`, once the extra observation of the mark is aligned.
fn marked_positions(base: &[u8], probe: &[u8], pos: usize) -> Result<Vec<usize>> {
    // probe[pos] is the room before the mark, probe[pos + 1] the mark itself.
    let aligned = probe[..pos].iter().chain(&probe[pos + 1..]);
    let hits = base
        .iter()
        .zip(aligned)
        .enumerate()
        .filter(|(_, (a, b))| a != b)
        .map(|(j, _)| j)
        .collect::<Vec<_>>();
    if hits.first() != Some(&pos) {
        return Err(Error::InconsistentGraph(format!(
            "mark at position {} not observed where expected (changed: {:?})",
            pos,
            &hits[..hits.len().min(8)]
        )));
    }
    Ok(hits)
}

fn record_edge(edges: &mut [[usize; NUM_DOORS]], from: usize, door: usize, to: usize) -> Result<()> {
    let slot = &mut edges[from][door];
    if *slot == UNKNOWN {
        *slot = to;
    } else if *slot != to {
        return Err(Error::InconsistentGraph(format!(
            "room {} door {} leads to both room {} and room {}",
            from, door, *slot, to
        )));
    }
    Ok(())
}

fn record_walk(
    edges: &mut [[usize; NUM_DOORS]],
    plan: &Plan,
    rooms: &[usize],
    len: usize,
) -> Result<()> {
    for (p, door) in plan.doors().take(len).enumerate() {
        record_edge(edges, rooms[p], door, rooms[p + 1])?;
    }
    Ok(())
}

fn known_doors(edges: &[[usize; NUM_DOORS]]) -> usize {
    edges.iter().flatten().filter(|&&to| to != UNKNOWN).count()
}

struct Discovery {
    walk: Plan,
    identities: Vec<Identity>,
    /// Room index (into `identities`) per trace position of `walk`.
    rooms: Vec<usize>,
    trace: Vec<u8>,
    /// Position of the last first sighting.
    cutoff: usize,
}

/// Identity discovery over one random `6n` walk.
fn discover<J: Judge + ?Sized, R: Rng + ?Sized>(
    n: usize,
    judge: &mut J,
    config: &ReconstructConfig,
    rng: &mut R,
) -> Result<Discovery> {
    let walk = Plan::random(NUM_DOORS * n, rng);
    let trace = explore_checked(judge, std::slice::from_ref(&walk))?.remove(0);

    let mut rooms = vec![UNKNOWN; trace.len()];
    let mut counters = [0usize; NUM_LABELS as usize];
    let mut identities: Vec<Identity> = vec![];
    for i in 0..trace.len() {
        if identities.len() == n {
            break;
        }
        if rooms[i] != UNKNOWN {
            continue;
        }
        let probe = walk.with_mark(i, mark_label(trace[i]))?;
        let probed = explore_checked(judge, std::slice::from_ref(&probe))?.remove(0);
        let label = trace[i] as usize;
        let room = identities.len();
        for j in marked_positions(&trace, &probed, i)? {
            if rooms[j] != UNKNOWN || trace[j] as usize != label {
                return Err(Error::InconsistentGraph(format!(
                    "position {} claimed by the mark at {}",
                    j, i
                )));
            }
            rooms[j] = room;
        }
        identities.push(Identity {
            fine: counters[label] * NUM_LABELS as usize + label,
            first_seen: i,
        });
        counters[label] += 1;
        debug!(position = i, room, label, "identified room");
    }

    if identities.len() < n {
        return Err(Error::UninformativePlan(format!(
            "walk exhausted with {} of {} rooms identified",
            identities.len(),
            n
        )));
    }
    let cutoff = identities.last().map_or(0, |id| id.first_seen);
    // A suffix of at least one door must remain for edge discovery.
    let limit = (walk.len() as f64 * config.max_prefix_ratio) as usize;
    let limit = limit.min(walk.len().saturating_sub(1));
    if cutoff > limit {
        return Err(Error::UninformativePlan(format!(
            "last room first seen at {} beyond {}",
            cutoff, limit
        )));
    }
    Ok(Discovery {
        walk,
        identities,
        rooms,
        trace,
        cutoff,
    })
}

/// One batched round of edge discovery on `base + random suffix`.
fn discover_edges<J: Judge + ?Sized, R: Rng + ?Sized>(
    d: &Discovery,
    edges: &mut [[usize; NUM_DOORS]],
    judge: &mut J,
    rng: &mut R,
) -> Result<()> {
    let query = d.walk.prefix(d.cutoff).extend_random(d.walk.len(), rng);
    let mut plans = Vec::with_capacity(d.identities.len() + 1);
    plans.push(query.clone());
    for id in &d.identities {
        plans.push(query.with_mark(id.first_seen, mark_label(id.label()))?);
    }
    let traces = explore_checked(judge, &plans)?;
    let base = &traces[0];
    if base[..=d.cutoff] != d.trace[..=d.cutoff] {
        return Err(Error::InconsistentGraph(
            "the shared prefix produced a different trace".to_string(),
        ));
    }

    let mut rooms = vec![UNKNOWN; base.len()];
    for (room, (id, probed)) in d.identities.iter().zip(&traces[1..]).enumerate() {
        for j in marked_positions(base, probed, id.first_seen)? {
            if (rooms[j] != UNKNOWN && rooms[j] != room) || base[j] != id.label() {
                return Err(Error::InconsistentGraph(format!(
                    "position {} cannot belong to room {}",
                    j, room
                )));
            }
            rooms[j] = room;
        }
    }
    if let Some(p) = rooms.iter().position(|&r| r == UNKNOWN) {
        return Err(Error::InconsistentGraph(format!(
            "position {} matched no known room",
            p
        )));
    }
    record_walk(edges, &query, &rooms, query.len())
}

/// Matches every door with a door on its target room that leads back.
fn pair_doors(edges: &[[usize; NUM_DOORS]]) -> Result<Vec<[DoorRef; NUM_DOORS]>> {
    if let Some((r, d)) = edges
        .iter()
        .enumerate()
        .find_map(|(r, to)| to.iter().position(|&t| t == UNKNOWN).map(|d| (r, d)))
    {
        return Err(Error::IncompleteGraph(format!(
            "room {} door {} was never traversed",
            r, d
        )));
    }

    let n = edges.len();
    let mut links: Vec<[Option<DoorRef>; NUM_DOORS]> = vec![[None; NUM_DOORS]; n];
    for r in 0..n {
        for d in 0..NUM_DOORS {
            if links[r][d].is_some() {
                continue;
            }
            let to = edges[r][d];
            let back = (0..NUM_DOORS)
                .filter(|&e| links[to][e].is_none() && edges[to][e] == r)
                .collect::<Vec<_>>();
            if to != r {
                let forth = (0..NUM_DOORS)
                    .filter(|&e| links[r][e].is_none() && edges[r][e] == to)
                    .count();
                if forth != back.len() {
                    return Err(Error::InconsistentGraph(format!(
                        "room {} has {} doors to room {} but {} back",
                        r,
                        forth,
                        to,
                        back.len()
                    )));
                }
            }
            // Parallel doors are interchangeable; prefer pairing a self-loop
            // with another door over pairing a door with itself.
            let e = back
                .iter()
                .copied()
                .find(|&e| !(to == r && e == d))
                .or_else(|| back.first().copied())
                .ok_or_else(|| {
                    Error::InconsistentGraph(format!(
                        "no door of room {} leads back to room {}",
                        to, r
                    ))
                })?;
            links[r][d] = Some(DoorRef::new(to, e));
            links[to][e] = Some(DoorRef::new(r, d));
        }
    }

    links
        .into_iter()
        .enumerate()
        .map(|(r, doors)| {
            let mut resolved = [DoorRef::new(0, 0); NUM_DOORS];
            for (d, link) in doors.into_iter().enumerate() {
                resolved[d] = link.ok_or_else(|| {
                    Error::IncompleteGraph(format!("room {} door {} left unpaired", r, d))
                })?;
            }
            Ok(resolved)
        })
        .collect()
}

/// Reconstructs a graph with `n` rooms using only `judge.explore`. Room 0 of
/// the result is the start room.
pub fn reconstruct<J: Judge + ?Sized, R: Rng + ?Sized>(
    n: usize,
    judge: &mut J,
    config: &ReconstructConfig,
    rng: &mut R,
) -> Result<Graph> {
    let discovery = discover(n, judge, config, rng)?;
    info!(
        rooms = n,
        prefix = discovery.cutoff,
        query_count = judge.query_count(),
        "identified all rooms"
    );

    let mut edges = vec![[UNKNOWN; NUM_DOORS]; n];
    record_walk(&mut edges, &discovery.walk, &discovery.rooms, discovery.cutoff)?;
    let mut round = 0;
    while known_doors(&edges) < NUM_DOORS * n {
        round += 1;
        if let Some(max) = config.max_rounds
            && round > max
        {
            return Err(Error::RoundsExhausted(max));
        }
        discover_edges(&discovery, &mut edges, judge, rng)?;
        debug!(
            round,
            known = known_doors(&edges),
            total = NUM_DOORS * n,
            "edge discovery"
        );
    }
    info!(rounds = round, query_count = judge.query_count(), "all doors traversed");

    let links = pair_doors(&edges)?;
    let rooms = discovery
        .identities
        .iter()
        .zip(links)
        .map(|(id, links)| Room {
            label: id.label(),
            links,
        })
        .collect();
    let graph = Graph::new(rooms, discovery.rooms[0])
        .map_err(|e| Error::InconsistentGraph(e.to_string()))?;
    if !graph.is_connected() {
        return Err(Error::InconsistentGraph(
            "reconstructed graph is not connected".to_string(),
        ));
    }
    Ok(graph)
}

/// Reconstructs and guesses until the judge accepts. Rejections and
/// restartable errors start over with fresh randomness; anything else is
/// returned as is.
pub fn solve<J: Judge + ?Sized, R: Rng + ?Sized>(
    judge: &mut J,
    config: &ReconstructConfig,
    rng: &mut R,
) -> Result<Graph> {
    let n = judge.num_rooms();
    let mut attempt = 0;
    loop {
        attempt += 1;
        if let Some(max) = config.max_attempts
            && attempt > max
        {
            return Err(Error::AttemptsExhausted(max));
        }
        match reconstruct(n, judge, config, rng) {
            Ok(graph) => {
                if judge.guess(&graph.to_map())? {
                    info!(attempt, query_count = judge.query_count(), "guess accepted");
                    return Ok(graph);
                }
                warn!(attempt, "guess rejected, restarting");
            }
            Err(e) if e.is_restartable() => {
                warn!(attempt, error = %e, "reconstruction failed, restarting");
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api;
    use crate::equivalence::{EquivalenceConfig, is_same_with};
    use crate::judge::LocalJudge;
    use crate::mapgen::random::generate;
    use crate::plan::Token;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn quick() -> EquivalenceConfig {
        EquivalenceConfig {
            walk_len: 20_000,
            mark_interval: 10,
        }
    }

    #[test]
    fn marking_only_changes_later_visits_of_the_marked_room() -> anyhow::Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let g = generate(12, 2, Some(11))?;
        for _ in 0..20 {
            let walk = Plan::random(40, &mut rng);
            let (route, trace) = g.walk(&walk)?;
            let pos = rng.random_range(0..route.len());
            let room = route[pos];
            let first = route.iter().position(|&r| r == room).unwrap_or(pos);
            let probed = g.explore(&walk.with_mark(first, mark_label(trace[first]))?)?;
            let hits = marked_positions(&trace, &probed, first)?;
            let expected = (first..route.len())
                .filter(|&j| route[j] == room)
                .collect::<Vec<_>>();
            assert_eq!(hits, expected);
        }
        Ok(())
    }

    #[test]
    fn reconstructs_probatio() -> anyhow::Result<()> {
        for seed in 0..5 {
            let mut judge = LocalJudge::new("probatio", Some(seed))?.with_equivalence(quick());
            assert_eq!(judge.graph().labels(), vec![0, 1, 2]);
            let config = ReconstructConfig {
                max_attempts: Some(50),
                ..Default::default()
            };
            let mut rng = ChaCha20Rng::seed_from_u64(seed + 100);
            let graph = solve(&mut judge, &config, &mut rng)?;
            assert_eq!(graph.num_rooms(), 3);
            assert_eq!(graph.start_room(), 0);
            assert!(is_same_with(judge.graph(), &graph, &quick(), &mut rng));
            assert!(judge.guesses().last().is_some_and(|g| g.correct));
        }
        Ok(())
    }

    #[test]
    fn reconstructs_layered_problem() -> anyhow::Result<()> {
        let mut judge = LocalJudge::new("aleph", Some(7))?.with_equivalence(quick());
        let config = ReconstructConfig {
            max_attempts: Some(100),
            ..Default::default()
        };
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let graph = solve(&mut judge, &config, &mut rng)?;
        assert_eq!(graph.num_rooms(), 12);
        assert!(is_same_with(judge.graph(), &graph, &quick(), &mut rng));
        Ok(())
    }

    #[test]
    fn too_many_rooms_exhausts_the_walk() -> anyhow::Result<()> {
        let mut judge = LocalJudge::new("probatio", Some(1))?;
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let err = reconstruct(4, &mut judge, &ReconstructConfig::default(), &mut rng)
            .expect_err("only three rooms exist");
        assert!(matches!(err, Error::UninformativePlan(_)));
        assert!(err.is_restartable());
        Ok(())
    }

    #[test]
    fn tight_prefix_bound_is_uninformative() -> anyhow::Result<()> {
        // The last room can never be first seen at position 0.
        let mut judge = LocalJudge::new("primus", Some(1))?;
        let config = ReconstructConfig {
            max_prefix_ratio: 0.0,
            ..Default::default()
        };
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let err = reconstruct(6, &mut judge, &config, &mut rng).expect_err("bound is zero");
        assert!(matches!(err, Error::UninformativePlan(_)));
        Ok(())
    }

    /// Answers single plans from one graph and batches from another.
    struct Flipping {
        first: Graph,
        second: Graph,
        cost: u64,
    }

    impl Judge for Flipping {
        fn num_rooms(&self) -> usize {
            self.first.num_rooms()
        }
        fn problem_name(&self) -> &str {
            "flipping"
        }
        fn explore(&mut self, plans: &[Plan]) -> Result<Vec<Vec<u8>>> {
            self.cost += plans.len() as u64 + 1;
            let g = if plans.len() > 1 {
                &self.second
            } else {
                &self.first
            };
            plans.iter().map(|p| g.explore(p)).collect()
        }
        fn guess(&mut self, _map: &api::Map) -> Result<bool> {
            Ok(false)
        }
        fn query_count(&self) -> u64 {
            self.cost
        }
    }

    #[test]
    fn contradicting_oracle_is_inconsistent() -> anyhow::Result<()> {
        let d = DoorRef::new;
        let across = |r: usize| Room {
            label: r as u8,
            links: std::array::from_fn(|e| d(1 - r, e)),
        };
        let stay = |r: usize| Room {
            label: r as u8,
            links: [d(r, 1), d(r, 0), d(r, 3), d(r, 2), d(r, 5), d(r, 4)],
        };
        let mut judge = Flipping {
            first: Graph::new(vec![across(0), across(1)], 0)?,
            second: Graph::new(vec![stay(0), stay(1)], 0)?,
            cost: 0,
        };
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let err = reconstruct(2, &mut judge, &ReconstructConfig::default(), &mut rng)
            .expect_err("oracle contradicts itself");
        assert!(matches!(err, Error::InconsistentGraph(_)), "{:?}", err);
        assert!(err.is_restartable());
        Ok(())
    }

    /// Three rooms, all labelled 0, visited in a fixed order that ignores the
    /// doors taken. Single plans see `0 1 0 2 2 ...`, batches `0 1 1 2 2 ...`.
    struct Scripted {
        cost: u64,
    }

    impl Scripted {
        fn room(batched: bool, step: usize) -> usize {
            match (batched, step) {
                (_, 0) => 0,
                (_, 1) => 1,
                (false, 2) => 0,
                (true, 2) => 1,
                _ => 2,
            }
        }
    }

    impl Judge for Scripted {
        fn num_rooms(&self) -> usize {
            3
        }
        fn problem_name(&self) -> &str {
            "scripted"
        }
        fn explore(&mut self, plans: &[Plan]) -> Result<Vec<Vec<u8>>> {
            self.cost += plans.len() as u64 + 1;
            let batched = plans.len() > 1;
            Ok(plans
                .iter()
                .map(|plan| {
                    let mut labels = [0u8; 3];
                    let mut step = 0;
                    let mut trace = vec![labels[Self::room(batched, step)]];
                    for &token in plan.tokens() {
                        match token {
                            Token::Door(_) => step += 1,
                            Token::Mark(l) => labels[Self::room(batched, step)] = l,
                        }
                        trace.push(labels[Self::room(batched, step)]);
                    }
                    trace
                })
                .collect())
        }
        fn guess(&mut self, _map: &api::Map) -> Result<bool> {
            Ok(false)
        }
        fn query_count(&self) -> u64 {
            self.cost
        }
    }

    #[test]
    fn edge_discovery_detects_conflicting_targets() -> anyhow::Result<()> {
        // The shared prefix `0 1 0 2` matches in both phases label for label,
        // but the batched suffix claims room 1's first door leads back to
        // room 1 instead of room 0.
        let mut judge = Scripted { cost: 0 };
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let err = reconstruct(3, &mut judge, &ReconstructConfig::default(), &mut rng)
            .expect_err("door targets disagree");
        match &err {
            Error::InconsistentGraph(msg) => assert!(msg.contains("leads to both"), "{}", msg),
            e => panic!("unexpected error: {:?}", e),
        }
        assert!(err.is_restartable());
        Ok(())
    }

    #[test]
    fn conflicting_edges_are_rejected() {
        let mut edges = vec![[UNKNOWN; NUM_DOORS]; 2];
        record_edge(&mut edges, 0, 3, 1).unwrap();
        record_edge(&mut edges, 0, 3, 1).unwrap();
        assert!(matches!(
            record_edge(&mut edges, 0, 3, 0),
            Err(Error::InconsistentGraph(_))
        ));
    }

    #[test]
    fn pairing_handles_parallel_doors_and_loops() {
        // Room 0: doors 0,1 to room 1, doors 2..5 to itself.
        // Room 1: doors 0,1 to room 0, doors 2..5 to itself.
        let edges = vec![[1, 1, 0, 0, 0, 0], [0, 0, 1, 1, 1, 1]];
        let links = pair_doors(&edges).unwrap();
        let rooms = links
            .into_iter()
            .enumerate()
            .map(|(r, links)| Room {
                label: r as u8,
                links,
            })
            .collect();
        let g = Graph::new(rooms, 0).unwrap();
        assert_eq!(g.link(0, 0), DoorRef::new(1, 0));
        assert_eq!(g.link(0, 1), DoorRef::new(1, 1));
        assert_eq!(g.link(0, 2), DoorRef::new(0, 3));
        assert_eq!(g.connections().len(), 6);
    }

    #[test]
    fn pairing_rejects_unbalanced_or_missing_doors() {
        let unbalanced = vec![[1, 1, 0, 0, 0, 0], [0, 1, 1, 1, 1, 1]];
        assert!(matches!(
            pair_doors(&unbalanced),
            Err(Error::InconsistentGraph(_))
        ));
        let one_way = vec![[1, 0, 0, 0, 0, 0], [1, 1, 1, 1, 1, 1]];
        assert!(matches!(
            pair_doors(&one_way),
            Err(Error::InconsistentGraph(_))
        ));
        let missing = vec![[0, 0, 0, 0, 0, UNKNOWN]];
        assert!(matches!(
            pair_doors(&missing),
            Err(Error::IncompleteGraph(_))
        ));
    }
}

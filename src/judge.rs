use crate::api;
use crate::equivalence::{self, EquivalenceConfig};
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::mapgen::random::{self, GeneratorConfig};
use crate::plan::Plan;
#[cfg(feature = "reqwest")]
use crate::problems;
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

/// One oracle session bound to a single hidden graph.
pub trait Judge {
    fn num_rooms(&self) -> usize;
    fn problem_name(&self) -> &str;
    /// Runs every plan against the hidden graph. Costs `plans.len() + 1`.
    fn explore(&mut self, plans: &[Plan]) -> Result<Vec<Vec<u8>>>;
    fn guess(&mut self, map: &api::Map) -> Result<bool>;
    /// Cumulative query cost of this session.
    fn query_count(&self) -> u64;
}

#[derive(Clone, Debug)]
pub struct GuessRecord {
    pub map: api::Map,
    pub correct: bool,
}

/// In-process simulator. Owns the hidden graph, the query counter, the most
/// recent explore batch and the guess log.
pub struct LocalJudge {
    problem_name: String,
    graph: Graph,
    cost: u64,
    /// Last `explore` batch; replayed against every guess.
    explored: Vec<(Plan, Vec<u8>)>,
    guesses: Vec<GuessRecord>,
    generator: GeneratorConfig,
    equivalence: EquivalenceConfig,
    rng: ChaCha20Rng,
}

impl Judge for LocalJudge {
    fn num_rooms(&self) -> usize {
        self.graph.num_rooms()
    }
    fn problem_name(&self) -> &str {
        &self.problem_name
    }
    fn explore(&mut self, plans: &[Plan]) -> Result<Vec<Vec<u8>>> {
        let ret = plans
            .iter()
            .map(|plan| self.graph.explore(plan))
            .collect::<Result<Vec<_>>>()?;
        self.cost += plans.len() as u64 + 1;
        debug!(plans = plans.len(), query_count = self.cost, "explore");
        self.explored = plans.iter().cloned().zip(ret.iter().cloned()).collect();
        Ok(ret)
    }
    fn guess(&mut self, map: &api::Map) -> Result<bool> {
        let candidate = Graph::from_map(map)?;
        let correct = check_explore(&candidate, &self.explored)
            && equivalence::is_same_with(
                &self.graph,
                &candidate,
                &self.equivalence,
                &mut self.rng,
            );
        info!(
            problem = %self.problem_name,
            rooms = candidate.num_rooms(),
            start = candidate.start_room(),
            correct,
            "guess"
        );
        self.guesses.push(GuessRecord {
            map: map.clone(),
            correct,
        });
        Ok(correct)
    }
    fn query_count(&self) -> u64 {
        self.cost
    }
}

impl LocalJudge {
    /// Selects `problem_name` with a freshly generated hidden graph.
    pub fn new(problem_name: &str, seed: Option<u64>) -> Result<Self> {
        let rng = match seed {
            Some(s) => ChaCha20Rng::seed_from_u64(s),
            None => ChaCha20Rng::from_os_rng(),
        };
        Self::with_rng(problem_name, GeneratorConfig::default(), rng)
    }

    pub fn with_rng(
        problem_name: &str,
        generator: GeneratorConfig,
        mut rng: ChaCha20Rng,
    ) -> Result<Self> {
        let graph = random::generate_problem(problem_name, &generator, &mut rng)?;
        Ok(Self {
            problem_name: problem_name.to_string(),
            graph,
            cost: 0,
            explored: vec![],
            guesses: vec![],
            generator,
            equivalence: EquivalenceConfig::default(),
            rng,
        })
    }

    /// A session over a fixed hidden graph.
    pub fn from_graph(problem_name: &str, graph: Graph, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha20Rng::seed_from_u64(s),
            None => ChaCha20Rng::from_os_rng(),
        };
        Self {
            problem_name: problem_name.to_string(),
            graph,
            cost: 0,
            explored: vec![],
            guesses: vec![],
            generator: GeneratorConfig::default(),
            equivalence: EquivalenceConfig::default(),
            rng,
        }
    }

    pub fn new_json(problem_name: Option<String>, map: &api::Map) -> Result<Self> {
        let graph = Graph::from_map(map)?;
        Ok(Self::from_graph(
            problem_name.as_deref().unwrap_or("json"),
            graph,
            None,
        ))
    }

    pub fn with_equivalence(mut self, equivalence: EquivalenceConfig) -> Self {
        self.equivalence = equivalence;
        self
    }

    /// Rebinds the session to a new hidden graph for `problem_name` and resets
    /// the query counter. Returns the problem name, like `/select`.
    pub fn select(&mut self, problem_name: &str) -> Result<String> {
        self.graph = random::generate_problem(problem_name, &self.generator, &mut self.rng)?;
        self.problem_name = problem_name.to_string();
        self.cost = 0;
        self.explored.clear();
        info!(problem = problem_name, rooms = self.graph.num_rooms(), "selected");
        Ok(self.problem_name.clone())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn guesses(&self) -> &[GuessRecord] {
        &self.guesses
    }
}

/// Replays explored plans on a candidate and reports the first mismatch.
pub fn check_explore(candidate: &Graph, explored: &[(Plan, Vec<u8>)]) -> bool {
    for (plan, result) in explored {
        match candidate.explore(plan) {
            Ok(route) if &route == result => {}
            Ok(route) => {
                warn!(
                    plan = %plan,
                    expected = %result.iter().join(""),
                    actual = %route.iter().join(""),
                    "candidate disagrees with an explored plan"
                );
                return false;
            }
            Err(e) => {
                warn!(plan = %plan, error = %e, "candidate cannot run an explored plan");
                return false;
            }
        }
    }
    true
}

/// Client for the contest service. Transport failures are retried with no
/// backoff, forever unless `max_retries` is set.
#[cfg(feature = "reqwest")]
pub struct RemoteJudge {
    problem_name: String,
    num_rooms: usize,
    cost: u64,
    max_retries: Option<usize>,
}

#[cfg(feature = "reqwest")]
impl Judge for RemoteJudge {
    fn num_rooms(&self) -> usize {
        self.num_rooms
    }
    fn problem_name(&self) -> &str {
        &self.problem_name
    }
    fn explore(&mut self, plans: &[Plan]) -> Result<Vec<Vec<u8>>> {
        let plans = plans.iter().map(|p| p.to_string()).collect_vec();
        let res = retry("explore", self.max_retries, || api::explore(&plans))?;
        if res.results.len() != plans.len() {
            return Err(Error::Transport(anyhow::anyhow!(
                "/explore answered {} results for {} plans",
                res.results.len(),
                plans.len()
            )));
        }
        self.cost = res.query_count;
        debug!(plans = plans.len(), query_count = self.cost, "explore");
        Ok(res.results)
    }
    fn guess(&mut self, map: &api::Map) -> Result<bool> {
        let correct = retry("guess", self.max_retries, || api::guess(map))?;
        info!(problem = %self.problem_name, correct, "guess");
        Ok(correct)
    }
    fn query_count(&self) -> u64 {
        self.cost
    }
}

#[cfg(feature = "reqwest")]
impl RemoteJudge {
    pub fn new(problem_name: &str, max_retries: Option<usize>) -> Result<Self> {
        let num_rooms = problems::get_problem(problem_name)
            .ok_or_else(|| Error::UnknownProblem(problem_name.to_string()))?
            .size();
        let selected = retry("select", max_retries, || api::select(problem_name))?;
        info!(problem = %selected, num_rooms, "selected");
        Ok(Self {
            problem_name: selected,
            num_rooms,
            cost: 0,
            max_retries,
        })
    }
}

#[cfg(feature = "reqwest")]
fn retry<T>(
    what: &str,
    max_retries: Option<usize>,
    mut f: impl FnMut() -> anyhow::Result<T>,
) -> Result<T> {
    let mut failures = 0;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) => {
                failures += 1;
                warn!(what, failures, error = %e, "transport failure, retrying");
                if max_retries.is_some_and(|m| failures > m) {
                    return Err(Error::Transport(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::two_rooms;

    #[test]
    fn explore_counts_queries() -> anyhow::Result<()> {
        let mut judge = LocalJudge::new("primus", Some(1))?;
        assert_eq!(judge.num_rooms(), 6);
        let plans = vec!["012".parse()?, "[1]3".parse()?];
        let results = judge.explore(&plans)?;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].len(), 4);
        assert_eq!(results[1].len(), 3);
        assert_eq!(judge.query_count(), 3);
        judge.explore(&plans[..1])?;
        assert_eq!(judge.query_count(), 5);
        Ok(())
    }

    #[test]
    fn guess_replays_only_the_last_batch() -> anyhow::Result<()> {
        let mut judge = LocalJudge::from_graph("pair", two_rooms(), Some(4));
        judge.explore(&["0".parse()?, "00".parse()?, "1".parse()?])?;
        judge.explore(&["5".parse()?])?;
        assert_eq!(judge.explored.len(), 1);
        assert_eq!(judge.explored[0].0.to_string(), "5");

        // Only room 0 is reachable through door 5, so a candidate with a
        // wrong label on room 1 passes the replay but not the equivalence walk.
        let mut wrong = judge.graph().to_map();
        wrong.rooms[1] = 1;
        let candidate = Graph::from_map(&wrong)?;
        assert!(check_explore(&candidate, &judge.explored));
        assert!(!judge.guess(&wrong)?);
        Ok(())
    }

    #[test]
    fn select_resets_session() -> anyhow::Result<()> {
        let mut judge = LocalJudge::new("probatio", Some(2))?;
        judge.explore(&["0".parse()?])?;
        assert_eq!(judge.select("vau")?, "vau");
        assert_eq!(judge.problem_name(), "vau");
        assert_eq!(judge.num_rooms(), 18);
        assert_eq!(judge.query_count(), 0);
        assert!(matches!(
            judge.select("nope"),
            Err(Error::UnknownProblem(_))
        ));
        Ok(())
    }

    #[test]
    fn guess_accepts_hidden_graph_and_logs() -> anyhow::Result<()> {
        let mut judge = LocalJudge::from_graph("pair", two_rooms(), Some(3));
        judge.explore(&["0[2]0".parse()?])?;
        let map = judge.graph().to_map();
        assert!(judge.guess(&map)?);

        let mut wrong = map.clone();
        wrong.rooms[1] = 2;
        assert!(!judge.guess(&wrong)?);

        let log = judge.guesses();
        assert_eq!(log.len(), 2);
        assert!(log[0].correct);
        assert!(!log[1].correct);
        Ok(())
    }

    #[test]
    fn guess_rejects_malformed_maps() {
        let mut judge = LocalJudge::from_graph("pair", two_rooms(), Some(3));
        let mut map = judge.graph().to_map();
        map.connections.clear();
        assert!(matches!(judge.guess(&map), Err(Error::InvalidMap(_))));
        assert!(judge.guesses().is_empty());
    }

    #[test]
    fn check_explore_reports_mismatch() -> anyhow::Result<()> {
        let g = two_rooms();
        let plan: Plan = "00".parse()?;
        assert!(check_explore(&g, &[(plan.clone(), vec![0, 3, 0])]));
        assert!(!check_explore(&g, &[(plan, vec![0, 3, 3])]));
        Ok(())
    }

    #[test]
    fn new_json_loads_map() -> anyhow::Result<()> {
        let map = two_rooms().to_map();
        let judge = LocalJudge::new_json(None, &map)?;
        assert_eq!(judge.problem_name(), "json");
        assert_eq!(judge.graph(), &two_rooms());
        Ok(())
    }
}

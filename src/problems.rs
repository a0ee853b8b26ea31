use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Problem {
    pub problem_name: &'static str,
    pub base_size: usize,
    pub layers: usize,
}

impl Problem {
    /// Total number of rooms in the hidden graph.
    pub fn size(&self) -> usize {
        self.base_size * self.layers
    }
}

const fn problem(problem_name: &'static str, base_size: usize, layers: usize) -> Problem {
    Problem {
        problem_name,
        base_size,
        layers,
    }
}

const PROBLEMS_DATA: &[Problem] = &[
    problem("probatio", 3, 1),
    problem("primus", 6, 1),
    problem("secundus", 12, 1),
    problem("tertius", 18, 1),
    problem("quartus", 24, 1),
    problem("quintus", 30, 1),
    problem("aleph", 6, 2),
    problem("beth", 12, 2),
    problem("gimel", 18, 2),
    problem("daleth", 24, 2),
    problem("he", 30, 2),
    problem("vau", 6, 3),
    problem("zain", 12, 3),
    problem("hhet", 18, 3),
    problem("teth", 24, 3),
    problem("iod", 30, 3),
];

pub fn all_problems() -> &'static [Problem] {
    PROBLEMS_DATA
}

// Build a name -> problem map once for O(1) lookup.
static PROBLEM_MAP: Lazy<HashMap<&'static str, &'static Problem>> = Lazy::new(|| {
    let mut m = HashMap::new();
    for p in PROBLEMS_DATA.iter() {
        m.insert(p.problem_name, p);
    }
    m
});

pub fn get_problem(name: &str) -> Option<&'static Problem> {
    PROBLEM_MAP.get(name).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_problems_contains_expected_entries() {
        let all = all_problems();
        assert_eq!(all.len(), 16);
        let names: Vec<&str> = all.iter().take(6).map(|p| p.problem_name).collect();
        assert_eq!(
            names,
            vec![
                "probatio", "primus", "secundus", "tertius", "quartus", "quintus"
            ]
        );
        let sizes: Vec<usize> = all.iter().map(|p| p.size()).collect();
        assert_eq!(
            sizes,
            vec![3, 6, 12, 18, 24, 30, 12, 24, 36, 48, 60, 18, 36, 54, 72, 90]
        );
    }

    #[test]
    fn get_problem_returns_expected() {
        let p = get_problem("iod").expect("iod should exist");
        assert_eq!((p.base_size, p.layers), (30, 3));
        assert_eq!(p.size(), 90);
        assert!(get_problem("unknown").is_none());
    }
}

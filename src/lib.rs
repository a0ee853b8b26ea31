// # Aedificium: mapping a hidden library of rooms
//
// This crate reconstructs the structure of a hidden, 6-regular, labeled graph
// ("the Aedificium") from route-plan queries, and provides the local pieces
// needed to test that without the contest service: a random map generator, an
// exploration oracle, and a randomized equivalence check.
//
// Network access to the contest service is behind the `reqwest` feature.

/// Crate-wide error type.
pub mod error;

pub use error::{Error, Result};

/// Client for the official contest web service, plus the wire map format.
pub mod api;

/// Definitions and data for the contest problems.
pub mod problems;

/// Route plans and their text encoding.
pub mod plan;

/// Rooms, doors and graphs; executing plans against a graph.
pub mod graph;

/// Randomized bisimulation check used to accept or reject a candidate map.
pub mod equivalence;

/// Abstraction for the problem environment (the "Aedificium"), with local and remote implementations.
pub mod judge;

/// Tools for generating problem maps.
pub mod mapgen {
    /// A module for generating random maps.
    pub mod random;
}

/// Reconstructing a hidden graph with marks.
pub mod reconstruct;

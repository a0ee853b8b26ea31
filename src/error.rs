//! Error taxonomy shared by the oracles and the reconstructor.

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A malformed token. Caller bug; never retried.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error("inconsistent graph: {0}")]
    InconsistentGraph(String),
    #[error("incomplete graph: {0}")]
    IncompleteGraph(String),
    /// The random Phase-1 plan did not reveal every room early enough.
    #[error("uninformative plan: {0}")]
    UninformativePlan(String),
    #[error("invalid map: {0}")]
    InvalidMap(String),
    #[error("unknown problem: {0}")]
    UnknownProblem(String),
    #[error("gave up after {0} reconstruction attempts")]
    AttemptsExhausted(usize),
    #[error("edge discovery did not finish within {0} rounds")]
    RoundsExhausted(usize),
    #[error("oracle transport failure")]
    Transport(#[source] anyhow::Error),
}

impl Error {
    /// Whether the acceptance loop should throw the attempt away and start over
    /// with fresh randomness.
    pub fn is_restartable(&self) -> bool {
        matches!(
            self,
            Error::InconsistentGraph(_) | Error::IncompleteGraph(_) | Error::UninformativePlan(_)
        )
    }
}

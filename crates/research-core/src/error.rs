//! Error types for research requests and agent invocations

use crate::outcome::ErrorKind;
use thiserror::Error;

/// Result type alias for request-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Request-level failures
///
/// Only these two ever reach the caller of the orchestrator. Everything an
/// individual agent can go wrong with is an [`AgentError`] and ends up inside
/// the report instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request violates its invariants and was rejected before dispatch
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Report assembly could not complete
    #[error("Internal fault: {0}")]
    InternalFault(String),
}

/// Per-agent failures
///
/// Each variant corresponds to exactly one [`ErrorKind`]; the message is kept
/// for diagnostics and rendered next to the kind in the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The vector store could not be reached
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// The tabular data source failed to run a query
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Queries ran but returned no rows for the requested period
    #[error("No data for period {0}")]
    NoDataForPeriod(String),

    /// The web search API could not be reached or rejected the request
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// The web search returned nothing
    #[error("No results found for '{0}'")]
    NoResultsFound(String),

    /// The invocation did not finish before its deadline
    #[error("Agent timed out after {after_ms} ms")]
    Timeout {
        /// Budget that was exhausted
        after_ms: u64,
    },

    /// The narrative synthesis backend failed
    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),
}

impl AgentError {
    /// Classify this error for the report
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RetrievalUnavailable(_) => ErrorKind::RetrievalUnavailable,
            Self::QueryExecution(_) => ErrorKind::QueryExecutionError,
            Self::NoDataForPeriod(_) => ErrorKind::NoDataForPeriod,
            Self::SearchUnavailable(_) => ErrorKind::SearchUnavailable,
            Self::NoResultsFound(_) => ErrorKind::NoResultsFound,
            Self::Timeout { .. } => ErrorKind::AgentTimeout,
            Self::SynthesisFailed(_) => ErrorKind::SynthesisFailed,
        }
    }
}

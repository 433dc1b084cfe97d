//! Error types for building and wiring the research system

use research_utils::ConfigError;
use thiserror::Error;

/// Configuration, fixture, and wiring errors
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dataset fixture is malformed
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Prompt template failed to compile or render
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// HTTP client construction failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Result type alias for research wiring operations
pub type Result<T> = std::result::Result<T, ResearchError>;

impl From<ConfigError> for ResearchError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Any wiring error surfacing through a request is an internal fault
impl From<ResearchError> for research_core::Error {
    fn from(err: ResearchError) -> Self {
        research_core::Error::InternalFault(err.to_string())
    }
}

/// Failure reported by an external collaborator
///
/// Agents translate these into the [`research_core::AgentError`] variant that
/// matches their data source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The service could not be reached or returned a server error
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the call (bad credentials, bad arguments)
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The service answered with something that could not be understood
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl CollaboratorError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {body}");
        match status {
            400..=499 if status != 408 && status != 429 => Self::Rejected(message),
            _ => Self::Unavailable(message),
        }
    }
}

//! Per-agent outcome records

use crate::agent::AgentReply;
use crate::error::AgentError;
use crate::request::AgentKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an agent invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Produced a result (possibly an explicit "nothing found")
    Ok,
    /// Failed; the outcome carries an [`ErrorKind`]
    Failed,
    /// Selected but not run because the agent is not configured
    Skipped,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        })
    }
}

/// Classification of a per-agent failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The embedder or vector store could not be reached
    RetrievalUnavailable,
    /// A tabular query failed
    QueryExecutionError,
    /// The tabular source has no rows for the requested period
    NoDataForPeriod,
    /// The web search service could not be reached
    SearchUnavailable,
    /// The web search returned nothing
    NoResultsFound,
    /// The agent did not finish before the request deadline
    AgentTimeout,
    /// Evidence was found but the narrative could not be written
    SynthesisFailed,
}

impl ErrorKind {
    /// Name as it appears in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrievalUnavailable => "RetrievalUnavailable",
            Self::QueryExecutionError => "QueryExecutionError",
            Self::NoDataForPeriod => "NoDataForPeriod",
            Self::SearchUnavailable => "SearchUnavailable",
            Self::NoResultsFound => "NoResultsFound",
            Self::AgentTimeout => "AgentTimeout",
            Self::SynthesisFailed => "SynthesisFailed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One (period_label, value) observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// Period label, e.g. `2023-Q2`
    pub label: String,
    /// Observed value
    pub value: f64,
}

/// A named chart-ready series, chronologically ordered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Metric name
    pub name: String,
    /// Points in chronological order
    pub points: Vec<SeriesPoint>,
}

impl Series {
    /// Create an empty series
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            points: Vec::new(),
        }
    }

    /// Append a point
    pub fn push(&mut self, label: impl Into<String>, value: f64) {
        self.points.push(SeriesPoint {
            label: label.into(),
            value,
        });
    }

    /// Whether the series has no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Structured data for charting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualPayload {
    /// Named series
    pub series: Vec<Series>,
}

impl VisualPayload {
    /// Wrap a set of series
    pub fn new(series: Vec<Series>) -> Self {
        Self { series }
    }

    /// Look up a series by name
    pub fn series(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

/// Provenance of a statement in a narrative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceRef {
    /// A retrieved report chunk
    Chunk {
        id: String,
        year: i32,
        quarter: u8,
        score: f32,
    },
    /// A web search result
    Web { title: String, url: String },
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk {
                id,
                year,
                quarter,
                score,
            } => write!(f, "{id} ({year}-Q{quarter}, relevance {score:.3})"),
            Self::Web { title, url } => write!(f, "[{title}]({url})"),
        }
    }
}

/// The result record for one agent in one request
///
/// Fields are read-only once constructed; every selected agent yields exactly
/// one outcome, failed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutcome {
    agent: AgentKind,
    status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    visual_payload: Option<VisualPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl AgentOutcome {
    /// Successful outcome from an agent reply
    pub fn ok(agent: AgentKind, reply: AgentReply) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Ok,
            narrative: Some(reply.narrative),
            visual_payload: reply.visual_payload,
            sources: reply.sources,
            error: None,
            detail: None,
        }
    }

    /// Failed outcome with its classification and a diagnostic message
    pub fn failed(agent: AgentKind, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Failed,
            narrative: None,
            visual_payload: None,
            sources: Vec::new(),
            error: Some(kind),
            detail: Some(detail.into()),
        }
    }

    /// Outcome for a selected agent that was not run
    pub fn skipped(agent: AgentKind, reason: impl Into<String>) -> Self {
        Self {
            agent,
            status: OutcomeStatus::Skipped,
            narrative: None,
            visual_payload: None,
            sources: Vec::new(),
            error: None,
            detail: Some(reason.into()),
        }
    }

    /// Downgrade an agent's result into an outcome
    pub fn from_result(agent: AgentKind, result: Result<AgentReply, AgentError>) -> Self {
        match result {
            Ok(reply) => Self::ok(agent, reply),
            Err(err) => Self::failed(agent, err.kind(), err.to_string()),
        }
    }

    /// Agent the outcome belongs to
    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    /// How the invocation ended
    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    /// Prose answer; present only on success
    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    /// Chartable series produced by the structured agent
    pub fn visual_payload(&self) -> Option<&VisualPayload> {
        self.visual_payload.as_ref()
    }

    /// Evidence the narrative cites
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    /// Failure classification; `None` unless the status is failed
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Failure message or skip reason
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Whether the agent produced a result
    pub fn is_ok(&self) -> bool {
        self.status == OutcomeStatus::Ok
    }

    /// Whether the agent failed
    pub fn is_failed(&self) -> bool {
        self.status == OutcomeStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_ok() {
        let reply = AgentReply::new("Revenue grew 12%.").with_sources(vec![SourceRef::Web {
            title: "Earnings".into(),
            url: "https://example.com/e".into(),
        }]);
        let outcome = AgentOutcome::from_result(AgentKind::Live, Ok(reply));

        assert!(outcome.is_ok());
        assert_eq!(outcome.narrative(), Some("Revenue grew 12%."));
        assert_eq!(outcome.sources().len(), 1);
        assert_eq!(outcome.error(), None);
    }

    #[test]
    fn test_from_result_err() {
        let outcome = AgentOutcome::from_result(
            AgentKind::Structured,
            Err(AgentError::NoDataForPeriod("2023-Q2".into())),
        );

        assert!(outcome.is_failed());
        assert_eq!(outcome.error(), Some(ErrorKind::NoDataForPeriod));
        assert_eq!(outcome.narrative(), None);
        assert!(outcome.detail().unwrap().contains("2023-Q2"));
    }

    #[test]
    fn test_skipped_has_no_error_kind() {
        let outcome = AgentOutcome::skipped(AgentKind::Live, "no search API key");
        assert_eq!(outcome.status(), OutcomeStatus::Skipped);
        assert_eq!(outcome.error(), None);
        assert_eq!(outcome.detail(), Some("no search API key"));
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = AgentOutcome::failed(
            AgentKind::Unstructured,
            ErrorKind::RetrievalUnavailable,
            "connection refused",
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["agent"], "unstructured");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "RetrievalUnavailable");
        assert!(json.get("narrative").is_none());
    }

    #[test]
    fn test_source_display() {
        let chunk = SourceRef::Chunk {
            id: "2023_2_14".into(),
            year: 2023,
            quarter: 2,
            score: 0.8123,
        };
        assert_eq!(chunk.to_string(), "2023_2_14 (2023-Q2, relevance 0.812)");
    }
}

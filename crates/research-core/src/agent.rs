//! The trait every research agent implements

use crate::error::AgentError;
use crate::outcome::{AgentOutcome, SourceRef, VisualPayload};
use crate::request::AgentKind;
use crate::task::AgentTask;
use async_trait::async_trait;

/// Successful payload of one agent invocation
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    /// Human-readable answer
    pub narrative: String,
    /// Chart-ready series, if the agent produces any
    pub visual_payload: Option<VisualPayload>,
    /// Where the narrative's claims come from
    pub sources: Vec<SourceRef>,
}

impl AgentReply {
    /// Reply with a narrative only
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            visual_payload: None,
            sources: Vec::new(),
        }
    }

    /// Attach chart data
    pub fn with_visual_payload(mut self, payload: VisualPayload) -> Self {
        self.visual_payload = Some(payload);
        self
    }

    /// Attach provenance
    pub fn with_sources(mut self, sources: Vec<SourceRef>) -> Self {
        self.sources = sources;
        self
    }
}

/// A specialised agent backed by one data source
///
/// Implementations only provide [`ResearchAgent::execute`]; the orchestrator
/// calls [`ResearchAgent::run`], which folds any [`AgentError`] into a failed
/// [`AgentOutcome`] so it never escapes the agent boundary.
#[async_trait]
pub trait ResearchAgent: Send + Sync {
    /// Which slot of the dispatch table this agent fills
    fn kind(&self) -> AgentKind;

    /// Answer the task from this agent's data source
    async fn execute(&self, task: &AgentTask) -> Result<AgentReply, AgentError>;

    /// Answer the task, recording failures in the outcome
    async fn run(&self, task: &AgentTask) -> AgentOutcome {
        AgentOutcome::from_result(self.kind(), self.execute(task).await)
    }
}

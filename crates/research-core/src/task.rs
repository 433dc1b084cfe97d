//! Per-invocation input handed to each agent

use crate::request::{PeriodFilter, ResearchRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What an agent is asked to answer
///
/// One task is built per request and shared read-only by every dispatched
/// agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTask {
    /// Identifier of the owning request, for log correlation
    pub request_id: Uuid,
    /// The research question
    pub question: String,
    /// Period constraint; agents without a notion of period ignore it
    pub period_filter: PeriodFilter,
}

impl AgentTask {
    /// Create a task with a fresh request id
    pub fn new(question: impl Into<String>, period_filter: PeriodFilter) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            question: question.into(),
            period_filter,
        }
    }

    /// Build the task for a validated request
    pub fn for_request(request_id: Uuid, request: &ResearchRequest) -> Self {
        Self {
            request_id,
            question: request.question.trim().to_string(),
            period_filter: request.period_filter,
        }
    }
}

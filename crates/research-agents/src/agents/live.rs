//! Live-search agent for current developments

use crate::collaborators::{SearchHit, WebSearch};
use crate::prompts::PromptSet;
use async_trait::async_trait;
use research_core::{AgentError, AgentKind, AgentReply, AgentTask, ResearchAgent, SourceRef};
use research_llm::{Evidence, NarrativeSynthesizer};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Summarises recent web and news results about the company
///
/// Ignores the task's period filter: search results are always current.
pub struct LiveAgent {
    search: Arc<dyn WebSearch>,
    synthesizer: Arc<dyn NarrativeSynthesizer>,
    prompts: Arc<PromptSet>,
    company: String,
    max_results: usize,
}

impl LiveAgent {
    pub fn new(
        search: Arc<dyn WebSearch>,
        synthesizer: Arc<dyn NarrativeSynthesizer>,
        prompts: Arc<PromptSet>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            search,
            synthesizer,
            prompts,
            company: company.into(),
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Search query for a question, scoped to the company
    pub fn query_for(&self, question: &str) -> String {
        let question = question.trim();
        if self.company.is_empty()
            || question
                .to_lowercase()
                .contains(&self.company.to_lowercase())
        {
            question.to_string()
        } else {
            format!("{} {question}", self.company)
        }
    }
}

#[async_trait]
impl ResearchAgent for LiveAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Live
    }

    #[instrument(skip(self, task), fields(request_id = %task.request_id))]
    async fn execute(&self, task: &AgentTask) -> Result<AgentReply, AgentError> {
        let query = self.query_for(&task.question);
        let hits = self
            .search
            .search(&query, self.max_results)
            .await
            .map_err(|e| AgentError::SearchUnavailable(e.to_string()))?;

        if hits.is_empty() {
            info!(error = %AgentError::NoResultsFound(query.clone()), "Reporting empty search as ok");
            return Ok(AgentReply::new(format!(
                "No current results were found for \"{query}\"."
            )));
        }

        // Clients are asked for max_results but not trusted to honour it
        let hits = &hits[..hits.len().min(self.max_results)];
        debug!(hits = hits.len(), "Synthesizing from search results");

        let instructions = self
            .prompts
            .live(&self.company, &task.question, self.max_results)
            .map_err(|e| AgentError::SynthesisFailed(e.to_string()))?;
        let evidence: Vec<Evidence> = hits
            .iter()
            .map(|hit| Evidence::new(format!("{} <{}>", hit.title, hit.url), hit.snippet.clone()))
            .collect();

        let narrative = self
            .synthesizer
            .synthesize(&instructions, &evidence)
            .await
            .map_err(|e| AgentError::SynthesisFailed(e.to_string()))?;

        Ok(AgentReply::new(narrative).with_sources(hits.iter().map(source).collect()))
    }
}

fn source(hit: &SearchHit) -> SourceRef {
    SourceRef::Web {
        title: hit.title.clone(),
        url: hit.url.clone(),
    }
}

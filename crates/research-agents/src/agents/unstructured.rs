//! Unstructured-retrieval agent over historical report chunks

use crate::prompts::PromptSet;
use crate::retriever::{MetadataFilteredRetriever, RetrievalError};
use async_trait::async_trait;
use research_core::{
    AgentError, AgentKind, AgentReply, AgentTask, ResearchAgent, RetrievalResult, SourceRef,
};
use research_llm::{Evidence, NarrativeSynthesizer};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_TOP_K: usize = 5;

/// Answers from the most relevant report chunks for the requested period
pub struct UnstructuredAgent {
    retriever: MetadataFilteredRetriever,
    synthesizer: Arc<dyn NarrativeSynthesizer>,
    prompts: Arc<PromptSet>,
    company: String,
    top_k: usize,
}

impl UnstructuredAgent {
    pub fn new(
        retriever: MetadataFilteredRetriever,
        synthesizer: Arc<dyn NarrativeSynthesizer>,
        prompts: Arc<PromptSet>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            retriever,
            synthesizer,
            prompts,
            company: company.into(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Number of chunks handed to synthesis
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

#[async_trait]
impl ResearchAgent for UnstructuredAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Unstructured
    }

    #[instrument(skip(self, task), fields(request_id = %task.request_id, filter = %task.period_filter))]
    async fn execute(&self, task: &AgentTask) -> Result<AgentReply, AgentError> {
        let result = self
            .retriever
            .retrieve(&task.question, &task.period_filter, self.top_k)
            .await
            .map_err(|e| match e {
                RetrievalError::Unavailable(msg) | RetrievalError::InvalidArgument(msg) => {
                    AgentError::RetrievalUnavailable(msg)
                }
            })?;

        if result.is_empty() {
            info!("No chunks matched the filter");
            return Ok(AgentReply::new(format!(
                "No grounded evidence was found in historical reports for {}.",
                task.period_filter
            )));
        }

        debug!(chunks = result.len(), "Synthesizing from retrieved chunks");
        let instructions = self
            .prompts
            .unstructured(&self.company, &task.question, &task.period_filter.to_string())
            .map_err(|e| AgentError::SynthesisFailed(e.to_string()))?;

        let narrative = self
            .synthesizer
            .synthesize(&instructions, &evidence(&result))
            .await
            .map_err(|e| AgentError::SynthesisFailed(e.to_string()))?;

        Ok(AgentReply::new(narrative).with_sources(sources(&result)))
    }
}

/// Chunk texts in rank order, labelled with id and period
fn evidence(result: &RetrievalResult) -> Vec<Evidence> {
    result
        .iter()
        .map(|hit| {
            Evidence::new(
                format!("{} ({})", hit.chunk.id, hit.chunk.metadata.period_label()),
                hit.chunk.text.clone(),
            )
        })
        .collect()
}

fn sources(result: &RetrievalResult) -> Vec<SourceRef> {
    result
        .iter()
        .map(|hit| SourceRef::Chunk {
            id: hit.chunk.id.clone(),
            year: hit.chunk.metadata.year,
            quarter: hit.chunk.metadata.quarter,
            score: hit.score,
        })
        .collect()
}

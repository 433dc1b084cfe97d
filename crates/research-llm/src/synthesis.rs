//! Turning retrieved evidence into a narrative

use crate::{CompletionRequest, LLMError, LLMProvider, Message, Result};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Longest excerpt the extractive synthesizer quotes per item, in characters
const EXCERPT_CHARS: usize = 280;

/// One piece of grounding material handed to a synthesizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    /// Short provenance label, e.g. `2023-Q2 report` or a headline
    pub label: String,
    /// The evidence text
    pub text: String,
}

impl Evidence {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Produces a narrative answer grounded in the given evidence
///
/// Implementations must not introduce facts that are absent from `evidence`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrativeSynthesizer: Send + Sync {
    /// Write a narrative following `instructions`, using only `evidence`
    async fn synthesize(&self, instructions: &str, evidence: &[Evidence]) -> Result<String>;
}

/// Synthesizer backed by an [`LLMProvider`]
///
/// The instructions become the system prompt; the evidence is numbered and
/// sent as a single user message.
pub struct LlmSynthesizer {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

impl LlmSynthesizer {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.3,
        }
    }

    /// Set the maximum tokens per narrative
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn evidence_message(evidence: &[Evidence]) -> String {
        let mut body = String::from("Evidence:\n");
        for (i, item) in evidence.iter().enumerate() {
            let _ = write!(body, "\n[{}] {}\n{}\n", i + 1, item.label, item.text.trim());
        }
        body
    }
}

#[async_trait]
impl NarrativeSynthesizer for LlmSynthesizer {
    #[instrument(skip_all, fields(provider = self.provider.name(), model = %self.model, evidence = evidence.len()))]
    async fn synthesize(&self, instructions: &str, evidence: &[Evidence]) -> Result<String> {
        let request = CompletionRequest::builder(&self.model)
            .system(instructions)
            .add_message(Message::user(Self::evidence_message(evidence)))
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build();

        let response = self.provider.complete(request).await?;
        debug!(
            stop_reason = ?response.stop_reason,
            tokens = response.usage.total(),
            "Narrative synthesized"
        );

        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(LLMError::UnexpectedResponse(
                "model returned an empty narrative".to_string(),
            ));
        }
        Ok(text.to_string())
    }
}

/// Deterministic synthesizer that quotes the leading evidence verbatim
///
/// Used when no LLM is configured. It never fails and never adds text that is
/// not in the evidence beyond its framing line.
#[derive(Debug, Clone, Default)]
pub struct ExtractiveSynthesizer {
    max_items: Option<usize>,
}

impl ExtractiveSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote at most `max_items` pieces of evidence
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }
}

#[async_trait]
impl NarrativeSynthesizer for ExtractiveSynthesizer {
    async fn synthesize(&self, _instructions: &str, evidence: &[Evidence]) -> Result<String> {
        let take = self.max_items.unwrap_or(evidence.len());
        let mut out = format!(
            "Key points from {} source{}:\n",
            evidence.len(),
            if evidence.len() == 1 { "" } else { "s" }
        );
        for item in evidence.iter().take(take) {
            let _ = write!(out, "\n- **{}**: {}", item.label, excerpt(&item.text));
        }
        Ok(out)
    }
}

/// First `EXCERPT_CHARS` characters of `text`, whitespace-collapsed
fn excerpt(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= EXCERPT_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(EXCERPT_CHARS).collect();
    cut.push('…');
    cut
}

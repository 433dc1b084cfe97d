//! OpenAI-compatible `/embeddings` client
//!
//! Hosted indexes must be queried with the model that embedded their chunks.
//! Any server speaking the OpenAI embeddings API works (api.openai.com,
//! text-embeddings-inference, vLLM, LM Studio), so the same sentence model
//! that built the index can be served behind it.

use super::DEFAULT_DIMENSION;
use crate::collaborators::Embedder;
use crate::error::{CollaboratorError, ResearchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use research_utils::EnvSource;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`OpenAIEmbedder`]
#[derive(Debug, Clone)]
pub struct EmbeddingApiConfig {
    /// Sent as a bearer token when present; local servers often need none
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    /// Requested output size; only sent to the server when set explicitly
    pub dimensions: Option<usize>,
    pub timeout: Duration,
}

impl EmbeddingApiConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: model.into(),
            dimensions: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `EMBEDDING_MODEL` (required), `EMBEDDING_API_BASE`,
    /// `EMBEDDING_DIMENSION` and `EMBEDDING_API_KEY` (falling back to
    /// `OPENAI_API_KEY`)
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    pub fn from_source(env: &EnvSource) -> Result<Self> {
        let mut config = Self::new(env.require("EMBEDDING_MODEL")?);
        config.api_key = env
            .get("EMBEDDING_API_KEY")
            .or_else(|| env.get("OPENAI_API_KEY"));
        if let Some(base) = env.get("EMBEDDING_API_BASE") {
            config = config.with_api_base(base);
        }
        config.dimensions = env.parse("EMBEDDING_DIMENSION")?;
        Ok(config)
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder calling an OpenAI-compatible embeddings endpoint
#[derive(Debug, Clone)]
pub struct OpenAIEmbedder {
    client: Client,
    config: EmbeddingApiConfig,
}

impl OpenAIEmbedder {
    pub fn new(config: EmbeddingApiConfig) -> Result<Self> {
        if !config.api_base.starts_with("http") {
            return Err(ResearchError::Config(format!(
                "embedding API base must be an http(s) URL, got '{}'",
                config.api_base
            )));
        }
        if config.dimensions == Some(0) {
            return Err(ResearchError::Config(
                "EMBEDDING_DIMENSION must be positive".to_string(),
            ));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request<'a>(&'a self, text: &'a str) -> EmbeddingRequest<'a> {
        EmbeddingRequest {
            model: &self.config.model,
            input: text,
            dimensions: self.config.dimensions,
        }
    }

    fn first_vector(
        &self,
        response: EmbeddingResponse,
    ) -> std::result::Result<Vec<f32>, CollaboratorError> {
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| CollaboratorError::Malformed("no embedding returned".to_string()))?;
        if vector.len() != self.dimension() {
            return Err(CollaboratorError::Malformed(format!(
                "model '{}' returned {} dimensions, expected {}",
                self.config.model,
                vector.len(),
                self.dimension()
            )));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text), fields(model = %self.config.model))]
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, CollaboratorError> {
        debug!(api_base = %self.config.api_base, "Requesting embedding");
        let mut builder = self
            .client
            .post(format!("{}/embeddings", self.config.api_base))
            .json(&self.request(text));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(status, &body));
        }

        self.first_vector(response.json().await?)
    }

    fn dimension(&self) -> usize {
        self.config.dimensions.unwrap_or(DEFAULT_DIMENSION)
    }
}

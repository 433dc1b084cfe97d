//! Pinecone vector store client
//!
//! Queries a serverless index over its data-plane REST API with the period
//! predicate pushed down as a metadata filter, so the index itself takes
//! `top_k` from the filtered set.

use crate::collaborators::VectorStore;
use crate::error::{CollaboratorError, ResearchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use research_core::{ChunkMetadata, DocumentChunk, PeriodFilter, ScoredChunk};
use research_utils::EnvSource;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const API_VERSION: &str = "2024-07";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// How `year`/`quarter` are stored in the index metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataEncoding {
    /// `"2023"`, `"2"` (how the reports were ingested)
    #[default]
    String,
    /// `2023`, `2`
    Number,
}

impl MetadataEncoding {
    fn encode(self, value: i64) -> Value {
        match self {
            Self::String => Value::String(value.to_string()),
            Self::Number => Value::from(value),
        }
    }
}

/// Configuration for the Pinecone client
#[derive(Debug, Clone)]
pub struct PineconeConfig {
    pub api_key: String,
    /// Index host, e.g. `https://reports-abc123.svc.us-east-1.pinecone.io`
    pub index_host: String,
    pub namespace: Option<String>,
    pub metadata_encoding: MetadataEncoding,
    /// Metadata key holding the chunk text
    pub text_field: String,
    pub timeout: Duration,
}

impl PineconeConfig {
    pub fn new(api_key: impl Into<String>, index_host: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            index_host: index_host.into().trim_end_matches('/').to_string(),
            namespace: None,
            metadata_encoding: MetadataEncoding::default(),
            text_field: "text".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Read `PINECONE_API_KEY`, `PINECONE_INDEX_HOST` and optionally
    /// `PINECONE_NAMESPACE`
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    pub fn from_source(env: &EnvSource) -> Result<Self> {
        let mut config = Self::new(
            env.require("PINECONE_API_KEY")?,
            env.require("PINECONE_INDEX_HOST")?,
        );
        config.namespace = env.get("PINECONE_NAMESPACE");
        if env.flag("PINECONE_NUMERIC_METADATA")?.unwrap_or(false) {
            config.metadata_encoding = MetadataEncoding::Number;
        }
        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_metadata_encoding(mut self, encoding: MetadataEncoding) -> Self {
        self.metadata_encoding = encoding;
        self
    }
}

/// Vector store backed by a Pinecone index
#[derive(Debug, Clone)]
pub struct PineconeClient {
    client: Client,
    config: PineconeConfig,
}

impl PineconeClient {
    pub fn new(config: PineconeConfig) -> Result<Self> {
        if !config.index_host.starts_with("http") {
            return Err(ResearchError::Config(format!(
                "index host must be an http(s) URL, got '{}'",
                config.index_host
            )));
        }
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn query_body(&self, embedding: &[f32], filter: &PeriodFilter, top_k: usize) -> Value {
        let mut body = json!({
            "vector": embedding,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        if let Some(filter) = metadata_filter(filter, self.config.metadata_encoding) {
            body["filter"] = filter;
        }
        if let Some(namespace) = &self.config.namespace {
            body["namespace"] = Value::String(namespace.clone());
        }
        body
    }
}

/// Exact-match conjunction on `year`/`quarter`, `None` when unconstrained
pub fn metadata_filter(filter: &PeriodFilter, encoding: MetadataEncoding) -> Option<Value> {
    let mut clauses = Map::new();
    if let Some(year) = filter.year {
        clauses.insert(
            "year".to_string(),
            json!({ "$eq": encoding.encode(i64::from(year)) }),
        );
    }
    if let Some(quarter) = filter.quarter {
        clauses.insert(
            "quarter".to_string(),
            json!({ "$eq": encoding.encode(i64::from(quarter)) }),
        );
    }
    (!clauses.is_empty()).then_some(Value::Object(clauses))
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Map<String, Value>,
}

/// Accepts both `2023` and `"2023"`
fn metadata_int(metadata: &Map<String, Value>, key: &str) -> Option<i64> {
    match metadata.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl QueryMatch {
    fn into_scored(self, text_field: &str) -> Option<ScoredChunk> {
        let year = i32::try_from(metadata_int(&self.metadata, "year")?).ok()?;
        let quarter = u8::try_from(metadata_int(&self.metadata, "quarter")?).ok()?;
        let text = self
            .metadata
            .get(text_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let chunk = DocumentChunk {
            id: self.id,
            text,
            embedding: Vec::new(),
            metadata: ChunkMetadata { year, quarter },
        };
        Some(ScoredChunk::new(Arc::new(chunk), self.score))
    }
}

#[async_trait]
impl VectorStore for PineconeClient {
    #[instrument(skip(self, embedding), fields(host = %self.config.index_host))]
    async fn search(
        &self,
        embedding: &[f32],
        filter: &PeriodFilter,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredChunk>, CollaboratorError> {
        let body = self.query_body(embedding, filter, top_k);
        debug!("Querying Pinecone index");

        let response = self
            .client
            .post(format!("{}/query", self.config.index_host))
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(status, &text));
        }

        let parsed: QueryResponse = response.json().await?;
        let total = parsed.matches.len();
        let mut hits: Vec<ScoredChunk> = parsed
            .matches
            .into_iter()
            .filter_map(|m| {
                let id = m.id.clone();
                let hit = m.into_scored(&self.config.text_field);
                if hit.is_none() {
                    warn!(chunk_id = %id, "Skipping match without year/quarter metadata");
                }
                hit
            })
            .collect();

        hits.sort_by(ScoredChunk::rank_cmp);
        hits.truncate(top_k);
        debug!(matches = total, kept = hits.len(), "Pinecone query complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_filter_shapes() {
        assert_eq!(
            metadata_filter(&PeriodFilter::unconstrained(), MetadataEncoding::String),
            None
        );
        assert_eq!(
            metadata_filter(&PeriodFilter::quarter(2023, 2), MetadataEncoding::String),
            Some(json!({"year": {"$eq": "2023"}, "quarter": {"$eq": "2"}}))
        );
        assert_eq!(
            metadata_filter(&PeriodFilter::year(2024), MetadataEncoding::Number),
            Some(json!({"year": {"$eq": 2024}}))
        );
    }

    #[test]
    fn test_query_body() {
        let config = PineconeConfig::new("key", "https://idx.example.io/").with_namespace("reports");
        let client = PineconeClient::new(config).unwrap();
        let body = client.query_body(&[0.1, 0.2], &PeriodFilter::quarter(2023, 2), 5);

        assert_eq!(body["topK"], 5);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["namespace"], "reports");
        assert_eq!(body["filter"]["quarter"]["$eq"], "2");
        assert_eq!(client.config.index_host, "https://idx.example.io");
    }

    #[test]
    fn test_match_parsing_is_tolerant() {
        let raw = json!({
            "matches": [
                {"id": "2023_2_0", "score": 0.91, "metadata": {"text": "Record revenue", "year": "2023", "quarter": "2"}},
                {"id": "2023_2_1", "score": 0.5, "metadata": {"text": "Gaming", "year": 2023, "quarter": 2.0}},
                {"id": "orphan", "score": 0.99, "metadata": {"text": "no period"}}
            ]
        });
        let parsed: QueryResponse = serde_json::from_value(raw).unwrap();
        let hits: Vec<_> = parsed
            .matches
            .into_iter()
            .filter_map(|m| m.into_scored("text"))
            .collect();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "Record revenue");
        assert_eq!(
            hits[1].chunk.metadata,
            ChunkMetadata {
                year: 2023,
                quarter: 2
            }
        );
    }

    #[test]
    fn test_config_from_source() {
        let env = EnvSource::from_pairs([
            ("PINECONE_API_KEY", "k"),
            ("PINECONE_INDEX_HOST", "https://idx.example.io"),
            ("PINECONE_NUMERIC_METADATA", "true"),
        ]);
        let config = PineconeConfig::from_source(&env).unwrap();
        assert_eq!(config.metadata_encoding, MetadataEncoding::Number);
        assert_eq!(config.namespace, None);

        let missing = PineconeConfig::from_source(&EnvSource::from_pairs([("PINECONE_API_KEY", "k")]));
        assert!(matches!(missing, Err(ResearchError::Config(_))));
    }

    #[test]
    fn test_rejects_non_url_host() {
        assert!(PineconeClient::new(PineconeConfig::new("k", "idx-host")).is_err());
    }
}

//! SerpAPI web search client

use crate::collaborators::{SearchHit, WebSearch};
use crate::error::{CollaboratorError, ResearchError, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use research_utils::EnvSource;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const BASE_URL: &str = "https://serpapi.com/search.json";
const DEFAULT_RATE_LIMIT: u32 = 30;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Configuration for SerpAPI
#[derive(Debug, Clone)]
pub struct SerpApiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Google time-range filter, e.g. `qdr:m` for the past month
    pub recency: Option<String>,
    /// Geographic bias, e.g. `United States`
    pub location: Option<String>,
    /// Top up thin news results with regular web results
    pub include_web_results: bool,
    pub rate_limit_per_minute: u32,
    pub timeout: Duration,
}

impl SerpApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            recency: Some("qdr:m".to_string()),
            location: Some("United States".to_string()),
            include_web_results: true,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT,
            timeout: Duration::from_secs(20),
        }
    }

    /// Read `SERPAPI_API_KEY`
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    pub fn from_source(env: &EnvSource) -> Result<Self> {
        Ok(Self::new(env.require("SERPAPI_API_KEY")?))
    }

    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.rate_limit_per_minute = per_minute;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_recency(mut self, recency: Option<String>) -> Self {
        self.recency = recency;
        self
    }
}

/// Which SerpAPI result list to request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResultKind {
    News,
    Web,
}

/// Google search through SerpAPI, rate limited per client
#[derive(Debug, Clone)]
pub struct SerpApiClient {
    client: Client,
    config: SerpApiConfig,
    rate_limiter: SharedRateLimiter,
}

impl SerpApiClient {
    pub fn new(config: SerpApiConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .map_err(|e| ResearchError::Config(format!("invalid SerpAPI base URL: {e}")))?;

        let quota = Quota::per_minute(
            NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN),
        );
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    fn request_url(&self, query: &str, num: usize, kind: ResultKind) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| ResearchError::Config(format!("invalid SerpAPI base URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("engine", "google")
                .append_pair("q", query)
                .append_pair("num", &num.to_string())
                .append_pair("api_key", &self.config.api_key);
            if kind == ResultKind::News {
                pairs.append_pair("tbm", "nws");
            }
            if let Some(recency) = &self.config.recency {
                pairs.append_pair("tbs", recency);
            }
            if let Some(location) = &self.config.location {
                pairs.append_pair("location", location);
            }
        }
        Ok(url)
    }

    async fn fetch(
        &self,
        query: &str,
        num: usize,
        kind: ResultKind,
    ) -> std::result::Result<Vec<SearchHit>, CollaboratorError> {
        let url = self
            .request_url(query, num, kind)
            .map_err(|e| CollaboratorError::Rejected(e.to_string()))?;

        self.rate_limiter.until_ready().await;
        debug!(?kind, "Calling SerpAPI");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(CollaboratorError::from_status(status, &text));
        }

        let body: SerpResponse = response.json().await?;
        body.into_hits(kind)
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    news_results: Vec<SerpResult>,
    #[serde(default)]
    organic_results: Vec<SerpResult>,
}

#[derive(Debug, Deserialize)]
struct SerpResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    link: String,
}

impl SerpResponse {
    fn into_hits(self, kind: ResultKind) -> std::result::Result<Vec<SearchHit>, CollaboratorError> {
        if let Some(error) = self.error {
            // An empty result set is reported as an error message by the API
            if error.contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(CollaboratorError::Rejected(error));
        }

        let results = match kind {
            ResultKind::News => self.news_results,
            ResultKind::Web => self.organic_results,
        };
        Ok(results
            .into_iter()
            .filter(|r| !r.link.is_empty())
            .map(|r| SearchHit {
                title: r.title,
                snippet: r.snippet,
                url: r.link,
            })
            .collect())
    }
}

#[async_trait]
impl WebSearch for SerpApiClient {
    #[instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<SearchHit>, CollaboratorError> {
        let mut hits = self.fetch(query, max_results, ResultKind::News).await?;

        if self.config.include_web_results && hits.len() < max_results {
            let extra = self.fetch(query, max_results, ResultKind::Web).await?;
            for hit in extra {
                if !hits.iter().any(|h| h.url == hit.url) {
                    hits.push(hit);
                }
            }
        }

        hits.truncate(max_results);
        debug!(results = hits.len(), "SerpAPI search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> SerpApiClient {
        SerpApiClient::new(SerpApiConfig::new("secret")).unwrap()
    }

    #[test]
    fn test_news_request_url() {
        let url = client()
            .request_url("NVIDIA data center & AI", 5, ResultKind::News)
            .unwrap();
        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["engine"], "google");
        assert_eq!(pairs["q"], "NVIDIA data center & AI");
        assert_eq!(pairs["num"], "5");
        assert_eq!(pairs["tbm"], "nws");
        assert_eq!(pairs["tbs"], "qdr:m");
    }

    #[test]
    fn test_web_request_has_no_news_flag() {
        let url = client()
            .request_url("q", 3, ResultKind::Web)
            .unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "tbm"));
    }

    #[test]
    fn test_parse_news_results() {
        let raw = json!({
            "news_results": [
                {"title": "Chip launch", "snippet": "New GPU", "link": "https://n.example/1"},
                {"title": "No link", "snippet": "dropped"}
            ],
            "organic_results": [{"title": "ignored", "link": "https://w.example"}]
        });
        let body: SerpResponse = serde_json::from_value(raw).unwrap();
        let hits = body.into_hits(ResultKind::News).unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                title: "Chip launch".into(),
                snippet: "New GPU".into(),
                url: "https://n.example/1".into(),
            }]
        );
    }

    #[test]
    fn test_api_errors() {
        let empty: SerpResponse = serde_json::from_value(
            json!({"error": "Google hasn't returned any results for this query."}),
        )
        .unwrap();
        assert!(empty.into_hits(ResultKind::News).unwrap().is_empty());

        let bad_key: SerpResponse =
            serde_json::from_value(json!({"error": "Invalid API key."})).unwrap();
        assert!(matches!(
            bad_key.into_hits(ResultKind::News),
            Err(CollaboratorError::Rejected(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = SerpApiConfig::new("k").with_base_url("not a url");
        assert!(matches!(
            SerpApiClient::new(config),
            Err(ResearchError::Config(_))
        ));
    }
}

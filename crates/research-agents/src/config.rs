//! Configuration for research requests and agents

use crate::error::{ResearchError, Result};
use research_utils::EnvSource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the orchestrator runs the selected agents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// All agents in flight at once
    #[default]
    Concurrent,
    /// One agent at a time, in report order
    Sequential,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Concurrent => "concurrent",
            Self::Sequential => "sequential",
        })
    }
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "concurrent" | "parallel" => Ok(Self::Concurrent),
            "sequential" | "serial" => Ok(Self::Sequential),
            other => Err(format!("unknown dispatch mode '{other}'")),
        }
    }
}

/// Configuration for the research orchestrator and its agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Company every question is about
    pub company: String,

    /// Chunks the unstructured agent retrieves per question
    pub retrieval_top_k: usize,

    /// Web results the live agent requests
    pub live_max_results: usize,

    /// Deadline for each agent invocation
    pub agent_timeout: Duration,

    /// Concurrent or sequential dispatch
    pub dispatch_mode: DispatchMode,

    /// LLM model used for narrative synthesis
    pub model: String,

    /// Token budget per synthesized narrative
    pub max_tokens: usize,

    /// Sampling temperature for synthesis
    pub temperature: f32,

    /// Lifetime of cached query embeddings
    pub embedding_cache_ttl: Duration,

    /// Web search request budget
    pub search_rate_limit_per_minute: u32,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            company: "NVIDIA".to_string(),
            retrieval_top_k: 5,
            live_max_results: 5,
            agent_timeout: Duration::from_secs(30),
            dispatch_mode: DispatchMode::Concurrent,
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2048,
            temperature: 0.3,
            embedding_cache_ttl: Duration::from_secs(600), // 10 minutes
            search_rate_limit_per_minute: 30,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Defaults overlaid with `RESEARCH_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_source(&EnvSource::Process)
    }

    /// Defaults overlaid with the variables found in `env`
    ///
    /// | variable | field |
    /// |---|---|
    /// | `RESEARCH_COMPANY` | `company` |
    /// | `RESEARCH_TOP_K` | `retrieval_top_k` |
    /// | `RESEARCH_LIVE_MAX_RESULTS` | `live_max_results` |
    /// | `RESEARCH_AGENT_TIMEOUT_SECS` | `agent_timeout` |
    /// | `RESEARCH_DISPATCH_MODE` | `dispatch_mode` |
    /// | `RESEARCH_MODEL` | `model` |
    /// | `RESEARCH_MAX_TOKENS` | `max_tokens` |
    /// | `RESEARCH_TEMPERATURE` | `temperature` |
    /// | `RESEARCH_EMBEDDING_CACHE_TTL_SECS` | `embedding_cache_ttl` |
    /// | `RESEARCH_SEARCH_RATE_LIMIT` | `search_rate_limit_per_minute` |
    pub fn from_source(env: &EnvSource) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(company) = env.get("RESEARCH_COMPANY") {
            builder = builder.company(company);
        }
        if let Some(top_k) = env.parse("RESEARCH_TOP_K")? {
            builder = builder.retrieval_top_k(top_k);
        }
        if let Some(max) = env.parse("RESEARCH_LIVE_MAX_RESULTS")? {
            builder = builder.live_max_results(max);
        }
        if let Some(timeout) = env.seconds("RESEARCH_AGENT_TIMEOUT_SECS")? {
            builder = builder.agent_timeout(timeout);
        }
        if let Some(mode) = env.parse("RESEARCH_DISPATCH_MODE")? {
            builder = builder.dispatch_mode(mode);
        }
        if let Some(model) = env.get("RESEARCH_MODEL") {
            builder = builder.model(model);
        }
        if let Some(max_tokens) = env.parse("RESEARCH_MAX_TOKENS")? {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = env.parse("RESEARCH_TEMPERATURE")? {
            builder = builder.temperature(temperature);
        }
        if let Some(ttl) = env.seconds("RESEARCH_EMBEDDING_CACHE_TTL_SECS")? {
            builder = builder.embedding_cache_ttl(ttl);
        }
        if let Some(rate) = env.parse("RESEARCH_SEARCH_RATE_LIMIT")? {
            builder = builder.search_rate_limit_per_minute(rate);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.company.trim().is_empty() {
            return Err(ResearchError::Config("company must not be empty".to_string()));
        }
        if self.retrieval_top_k == 0 {
            return Err(ResearchError::Config(
                "retrieval_top_k must be greater than 0".to_string(),
            ));
        }
        if self.live_max_results == 0 {
            return Err(ResearchError::Config(
                "live_max_results must be greater than 0".to_string(),
            ));
        }
        if self.agent_timeout.is_zero() {
            return Err(ResearchError::Config(
                "agent_timeout must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ResearchError::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ResearchError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    company: Option<String>,
    retrieval_top_k: Option<usize>,
    live_max_results: Option<usize>,
    agent_timeout: Option<Duration>,
    dispatch_mode: Option<DispatchMode>,
    model: Option<String>,
    max_tokens: Option<usize>,
    temperature: Option<f32>,
    embedding_cache_ttl: Option<Duration>,
    search_rate_limit_per_minute: Option<u32>,
}

impl ResearchConfigBuilder {
    /// Set the company under research
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the retrieval depth
    pub fn retrieval_top_k(mut self, top_k: usize) -> Self {
        self.retrieval_top_k = Some(top_k);
        self
    }

    /// Set the number of web results
    pub fn live_max_results(mut self, max: usize) -> Self {
        self.live_max_results = Some(max);
        self
    }

    /// Set the per-agent deadline
    pub fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.agent_timeout = Some(timeout);
        self
    }

    /// Set the dispatch mode
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = Some(mode);
        self
    }

    /// Set the synthesis model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the synthesis token budget
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the synthesis temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the embedding cache lifetime
    pub fn embedding_cache_ttl(mut self, ttl: Duration) -> Self {
        self.embedding_cache_ttl = Some(ttl);
        self
    }

    /// Set the web search rate limit
    pub fn search_rate_limit_per_minute(mut self, rate: u32) -> Self {
        self.search_rate_limit_per_minute = Some(rate);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<ResearchConfig> {
        let defaults = ResearchConfig::default();

        let config = ResearchConfig {
            company: self.company.unwrap_or(defaults.company),
            retrieval_top_k: self.retrieval_top_k.unwrap_or(defaults.retrieval_top_k),
            live_max_results: self.live_max_results.unwrap_or(defaults.live_max_results),
            agent_timeout: self.agent_timeout.unwrap_or(defaults.agent_timeout),
            dispatch_mode: self.dispatch_mode.unwrap_or(defaults.dispatch_mode),
            model: self.model.unwrap_or(defaults.model),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: self.temperature.unwrap_or(defaults.temperature),
            embedding_cache_ttl: self
                .embedding_cache_ttl
                .unwrap_or(defaults.embedding_cache_ttl),
            search_rate_limit_per_minute: self
                .search_rate_limit_per_minute
                .unwrap_or(defaults.search_rate_limit_per_minute),
        };

        config.validate()?;
        Ok(config)
    }
}

//! Interfaces to the external systems the agents depend on
//!
//! Every collaborator is injected as a trait object at construction, so tests
//! and the CLI can swap network clients for in-memory implementations.

use crate::error::CollaboratorError;
use crate::tabular::{MetricRow, QuerySpec};
use async_trait::async_trait;
use research_core::{PeriodFilter, ScoredChunk};
use serde::{Deserialize, Serialize};

/// Nearest-neighbour search over stored chunks
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Up to `top_k` chunks matching `filter`, best first
    ///
    /// The filter must be applied before ranking so that `top_k` is taken
    /// from the filtered set.
    async fn search(
        &self,
        embedding: &[f32],
        filter: &PeriodFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredChunk>, CollaboratorError>;
}

/// Maps text into the vector store's embedding space
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CollaboratorError>;

    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;
}

/// Executes aggregate queries over the tabular financial dataset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Per-quarter rows for the query, in any order
    async fn execute(&self, spec: &QuerySpec) -> Result<Vec<MetricRow>, CollaboratorError>;
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Real-time web search
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// At most `max_results` hits for `query`
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CollaboratorError>;
}

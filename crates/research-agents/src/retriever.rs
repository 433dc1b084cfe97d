//! Metadata-filtered retrieval over the vector store

use crate::collaborators::{Embedder, VectorStore};
use crate::error::CollaboratorError;
use research_core::{PeriodFilter, RetrievalResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Why a retrieval produced no result
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// The embedder or vector store could not serve the query
    #[error("retrieval unavailable: {0}")]
    Unavailable(String),

    /// The caller passed an argument outside its domain
    #[error("invalid retrieval argument: {0}")]
    InvalidArgument(String),
}

impl From<CollaboratorError> for RetrievalError {
    fn from(err: CollaboratorError) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Embeds a query and searches the store within a period filter
///
/// Filtering happens in the store, so `top_k` is taken from the matching set.
/// Results are re-checked against the filter and re-ranked before returning,
/// which keeps the ordering and filter guarantees even for remote stores.
#[derive(Clone)]
pub struct MetadataFilteredRetriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl MetadataFilteredRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }

    /// Up to `top_k` chunks matching `filter`, by descending relevance
    ///
    /// No matching chunk is an empty result, not an error.
    #[instrument(skip(self), fields(filter = %filter))]
    pub async fn retrieve(
        &self,
        query: &str,
        filter: &PeriodFilter,
        top_k: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        filter
            .validate()
            .map_err(|e| RetrievalError::InvalidArgument(e.to_string()))?;

        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(&embedding, filter, top_k).await?;
        let returned = hits.len();

        let hits: Vec<_> = hits
            .into_iter()
            .filter(|hit| {
                let keep = filter.matches(&hit.chunk.metadata);
                if !keep {
                    warn!(
                        chunk_id = %hit.chunk.id,
                        period = %hit.chunk.metadata.period_label(),
                        "Store returned a chunk outside the filter; dropping it"
                    );
                }
                keep
            })
            .collect();

        let result = RetrievalResult::ranked(hits, top_k);
        debug!(returned, kept = result.len(), "Retrieval complete");
        Ok(result)
    }
}

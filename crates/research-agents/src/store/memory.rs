//! In-process vector store with storage-layer metadata filtering

use crate::collaborators::VectorStore;
use crate::embedding::cosine_similarity;
use crate::error::{CollaboratorError, ResearchError, Result};
use async_trait::async_trait;
use research_core::{ChunkMetadata, DocumentChunk, PeriodFilter, ScoredChunk};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Brute-force cosine search over an owned set of chunks
///
/// The period predicate is applied before scoring, so `top_k` is always taken
/// from the filtered set. Negative similarities score 0.
#[derive(Debug, Clone)]
pub struct InMemoryVectorStore {
    dimension: usize,
    chunks: Vec<Arc<DocumentChunk>>,
}

impl InMemoryVectorStore {
    /// Empty store accepting embeddings of `dimension`
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            chunks: Vec::new(),
        }
    }

    /// Add a chunk; its embedding must match the store dimension and its id
    /// must be new
    pub fn insert(&mut self, chunk: DocumentChunk) -> Result<()> {
        if chunk.embedding.len() != self.dimension {
            return Err(ResearchError::Dataset(format!(
                "chunk '{}' has embedding dimension {}, expected {}",
                chunk.id,
                chunk.embedding.len(),
                self.dimension
            )));
        }
        if !(1..=4).contains(&chunk.metadata.quarter) {
            return Err(ResearchError::Dataset(format!(
                "chunk '{}' has quarter {}, expected 1..=4",
                chunk.id, chunk.metadata.quarter
            )));
        }
        if self.chunks.iter().any(|c| c.id == chunk.id) {
            return Err(ResearchError::Dataset(format!(
                "duplicate chunk id '{}'",
                chunk.id
            )));
        }
        self.chunks.push(Arc::new(chunk));
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Distinct periods covered by stored chunks
    pub fn available_periods(&self) -> BTreeSet<ChunkMetadata> {
        self.chunks.iter().map(|c| c.metadata).collect()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn search(
        &self,
        embedding: &[f32],
        filter: &PeriodFilter,
        top_k: usize,
    ) -> std::result::Result<Vec<ScoredChunk>, CollaboratorError> {
        if embedding.len() != self.dimension {
            return Err(CollaboratorError::Rejected(format!(
                "query embedding has dimension {}, index expects {}",
                embedding.len(),
                self.dimension
            )));
        }

        let mut hits: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter(|chunk| filter.matches(&chunk.metadata))
            .map(|chunk| {
                let score = cosine_similarity(embedding, &chunk.embedding).max(0.0);
                ScoredChunk::new(Arc::clone(chunk), score)
            })
            .collect();

        hits.sort_by(ScoredChunk::rank_cmp);
        hits.truncate(top_k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, year: i32, quarter: u8, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            id: id.to_string(),
            text: format!("text {id}"),
            embedding,
            metadata: ChunkMetadata { year, quarter },
        }
    }

    fn store() -> InMemoryVectorStore {
        let mut store = InMemoryVectorStore::new(2);
        store.insert(chunk("a", 2023, 2, vec![1.0, 0.0])).unwrap();
        store.insert(chunk("b", 2023, 3, vec![1.0, 0.0])).unwrap();
        store.insert(chunk("c", 2023, 2, vec![0.6, 0.8])).unwrap();
        store.insert(chunk("d", 2022, 2, vec![1.0, 0.0])).unwrap();
        store.insert(chunk("e", 2023, 2, vec![-1.0, 0.0])).unwrap();
        store
    }

    #[tokio::test]
    async fn test_filter_applies_before_top_k() {
        let hits = store()
            .search(&[1.0, 0.0], &PeriodFilter::quarter(2023, 2), 2)
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        // b and d score higher than c but fail the filter
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_ties_break_by_id_and_negative_scores_clamp() {
        let hits = store()
            .search(&[1.0, 0.0], &PeriodFilter::unconstrained(), 10)
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "d", "c", "e"]);
        assert_eq!(hits[4].score, 0.0);
    }

    #[tokio::test]
    async fn test_no_match_is_empty() {
        let hits = store()
            .search(&[1.0, 0.0], &PeriodFilter::year(2019), 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let err = store()
            .search(&[1.0, 0.0, 0.0], &PeriodFilter::unconstrained(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Rejected(_)));
    }

    #[test]
    fn test_insert_validation() {
        let mut store = store();
        assert!(store.insert(chunk("x", 2023, 1, vec![1.0])).is_err());
        assert!(store.insert(chunk("y", 2023, 5, vec![1.0, 0.0])).is_err());
        assert!(store.insert(chunk("a", 2023, 1, vec![1.0, 0.0])).is_err());
        assert_eq!(store.len(), 5);
        assert_eq!(store.available_periods().len(), 3);
    }
}

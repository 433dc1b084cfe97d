//! Document chunks and ranked retrieval results

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

/// Period a chunk was reported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Fiscal year
    pub year: i32,
    /// Fiscal quarter, 1..=4
    pub quarter: u8,
}

impl ChunkMetadata {
    /// Label in the form `2023-Q2`
    pub fn period_label(&self) -> String {
        format!("{}-Q{}", self.year, self.quarter)
    }
}

/// A bounded span of report text with its embedding
///
/// Chunks are owned by the vector store and shared with retrieval results
/// through `Arc`, never copied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Opaque identifier, also the tie-break key for equal scores
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Embedding in the store's vector space
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// Reporting period
    pub metadata: ChunkMetadata,
}

/// A chunk with its relevance to one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The stored chunk
    pub chunk: Arc<DocumentChunk>,
    /// Relevance in [0, 1]
    pub score: f32,
}

impl ScoredChunk {
    /// Pair a chunk with a score, clamping the score into [0, 1]
    pub fn new(chunk: Arc<DocumentChunk>, score: f32) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self { chunk, score }
    }

    /// Retrieval order: descending score, then ascending chunk id
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.chunk.id.cmp(&other.chunk.id))
    }
}

/// Ranked chunks for one query, at most `top_k` long
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    /// Rank `hits` and keep the best `top_k`
    pub fn ranked(mut hits: Vec<ScoredChunk>, top_k: usize) -> Self {
        hits.sort_by(ScoredChunk::rank_cmp);
        hits.truncate(top_k);
        Self { hits }
    }

    /// An empty result ("no evidence found")
    pub fn empty() -> Self {
        Self::default()
    }

    /// The ranked hits
    pub fn hits(&self) -> &[ScoredChunk] {
        &self.hits
    }

    /// Iterate the hits in rank order
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredChunk> {
        self.hits.iter()
    }

    /// Number of hits
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a ScoredChunk;
    type IntoIter = std::slice::Iter<'a, ScoredChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str) -> Arc<DocumentChunk> {
        Arc::new(DocumentChunk {
            id: id.to_string(),
            text: format!("text of {id}"),
            embedding: vec![1.0, 0.0],
            metadata: ChunkMetadata {
                year: 2024,
                quarter: 1,
            },
        })
    }

    #[test]
    fn test_ranking_breaks_ties_by_id() {
        let hits = vec![
            ScoredChunk::new(chunk("c"), 0.5),
            ScoredChunk::new(chunk("a"), 0.9),
            ScoredChunk::new(chunk("b"), 0.5),
            ScoredChunk::new(chunk("d"), 0.7),
        ];

        let result = RetrievalResult::ranked(hits, 10);
        let ids: Vec<_> = result.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_ranking_truncates_to_top_k() {
        let hits = (0..8)
            .map(|i| ScoredChunk::new(chunk(&format!("c{i}")), i as f32 / 10.0))
            .collect();

        let result = RetrievalResult::ranked(hits, 3);
        assert_eq!(result.len(), 3);
        assert_eq!(result.hits()[0].chunk.id, "c7");
    }

    #[test]
    fn test_scores_are_clamped() {
        assert_eq!(ScoredChunk::new(chunk("a"), 1.4).score, 1.0);
        assert_eq!(ScoredChunk::new(chunk("a"), -0.2).score, 0.0);
        assert_eq!(ScoredChunk::new(chunk("a"), f32::NAN).score, 0.0);
    }

    #[test]
    fn test_results_share_chunks() {
        let stored = chunk("shared");
        let result = RetrievalResult::ranked(vec![ScoredChunk::new(Arc::clone(&stored), 0.8)], 5);
        assert!(Arc::ptr_eq(&stored, &result.hits()[0].chunk));
    }

    #[test]
    fn test_period_label() {
        let meta = ChunkMetadata {
            year: 2023,
            quarter: 4,
        };
        assert_eq!(meta.period_label(), "2023-Q4");
    }
}

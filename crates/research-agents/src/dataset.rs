//! JSON research dataset: report chunks plus per-day metric observations
//!
//! ```json
//! {
//!   "company": "NVIDIA",
//!   "chunks": [
//!     {"id": "2023_2_0", "year": 2023, "quarter": 2, "text": "Data center revenue..."}
//!   ],
//!   "metrics": [
//!     {"year": 2023, "quarter": 2, "CLOSE": 42.1, "VOLUME": 51000000}
//!   ]
//! }
//! ```
//!
//! Chunks without an `embedding` are embedded on load.

use crate::collaborators::Embedder;
use crate::error::{ResearchError, Result};
use crate::store::InMemoryVectorStore;
use crate::tabular::{InMemoryTable, Observation};
use research_core::{ChunkMetadata, DocumentChunk};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// One report chunk as stored in the fixture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub text: String,
    pub year: i32,
    pub quarter: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One metric observation; every field but year and quarter is a metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub year: i32,
    pub quarter: u8,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default)]
    pub chunks: Vec<ChunkRecord>,
    #[serde(default)]
    pub metrics: Vec<MetricRecord>,
}

impl ResearchDataset {
    /// Read and validate a dataset file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let dataset = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            chunks = dataset.chunks.len(),
            metrics = dataset.metrics.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Parse and validate a dataset
    pub fn from_json(raw: &str) -> Result<Self> {
        let dataset: Self = serde_json::from_str(raw)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Quarters in range, chunk ids unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for chunk in &self.chunks {
            check_quarter(&format!("chunk '{}'", chunk.id), chunk.quarter)?;
            if !seen.insert(chunk.id.as_str()) {
                return Err(ResearchError::Dataset(format!(
                    "duplicate chunk id '{}'",
                    chunk.id
                )));
            }
        }
        for (i, record) in self.metrics.iter().enumerate() {
            check_quarter(&format!("metric record {i}"), record.quarter)?;
        }
        Ok(())
    }

    /// Embed any chunk lacking a vector and load all chunks into a store
    pub async fn into_vector_store(self, embedder: &dyn Embedder) -> Result<InMemoryVectorStore> {
        let mut store = InMemoryVectorStore::new(embedder.dimension());
        for record in self.chunks {
            let embedding = match record.embedding {
                Some(embedding) => embedding,
                None => embedder.embed(&record.text).await.map_err(|e| {
                    ResearchError::Dataset(format!("failed to embed chunk '{}': {e}", record.id))
                })?,
            };
            store.insert(DocumentChunk {
                id: record.id,
                text: record.text,
                embedding,
                metadata: ChunkMetadata {
                    year: record.year,
                    quarter: record.quarter,
                },
            })?;
        }
        debug!(chunks = store.len(), dimension = store.dimension(), "Vector store built");
        Ok(store)
    }

    /// Metric observations as a queryable table
    pub fn to_table(&self) -> InMemoryTable {
        self.metrics
            .iter()
            .map(|record| Observation {
                year: record.year,
                quarter: record.quarter,
                values: record.values.clone(),
            })
            .collect()
    }

    /// Every (year, quarter) with a chunk or a metric observation
    pub fn available_periods(&self) -> BTreeSet<(i32, u8)> {
        self.chunks
            .iter()
            .map(|c| (c.year, c.quarter))
            .chain(self.metrics.iter().map(|m| (m.year, m.quarter)))
            .collect()
    }
}

fn check_quarter(what: &str, quarter: u8) -> Result<()> {
    if (1..=4).contains(&quarter) {
        Ok(())
    } else {
        Err(ResearchError::Dataset(format!(
            "{what} has quarter {quarter}, expected 1..=4"
        )))
    }
}

//! Research agents and the orchestrator that runs them
//!
//! This crate turns a [`research_core::ResearchRequest`] into a
//! [`research_core::ResearchReport`]:
//!
//! - [`agents`]: structured metrics, historical report retrieval, live search
//! - [`retriever`]: embedding plus period-filtered nearest-neighbour search
//! - [`engine`]: the request lifecycle and concurrent dispatch
//! - [`store`], [`search`], [`tabular`]: in-process and HTTP collaborators
//! - [`dataset`]: the JSON fixture the CLI runs against
//!
//! ```no_run
//! use research_agents::{Collaborators, ResearchConfig, ResearchDataset, ResearchOrchestrator};
//! use research_agents::embedding::HashingEmbedder;
//! use research_core::{AgentKind, PeriodFilter, ResearchRequest};
//! use research_llm::ExtractiveSynthesizer;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = ResearchDataset::load("demos/nvidia.json").await?;
//! let embedder = Arc::new(HashingEmbedder::default());
//! let table = dataset.to_table();
//! let store = dataset.into_vector_store(embedder.as_ref()).await?;
//!
//! let orchestrator = ResearchOrchestrator::with_collaborators(
//!     &ResearchConfig::default(),
//!     Collaborators {
//!         embedder,
//!         vector_store: Arc::new(store),
//!         tabular: Arc::new(table),
//!         web_search: None,
//!         synthesizer: Arc::new(ExtractiveSynthesizer::new()),
//!     },
//! )?;
//!
//! let request = ResearchRequest::new("valuation trend", AgentKind::ALL)
//!     .with_period(PeriodFilter::quarter(2023, 2));
//! let report = orchestrator.submit_research_request(request).await?;
//! println!("{}", report.to_markdown());
//! # Ok(())
//! # }
//! ```

pub mod agents;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod prompts;
pub mod retriever;
pub mod router;
pub mod search;
pub mod store;
pub mod tabular;

pub use agents::{LiveAgent, StructuredAgent, UnstructuredAgent};
pub use collaborators::{Embedder, SearchHit, TabularSource, VectorStore, WebSearch};
pub use config::{DispatchMode, ResearchConfig};
pub use dataset::ResearchDataset;
pub use engine::{AgentSlot, Collaborators, RequestLifecycle, RequestState, ResearchOrchestrator};
pub use error::{CollaboratorError, ResearchError, Result};
pub use retriever::{MetadataFilteredRetriever, RetrievalError};
pub use search::{SerpApiClient, SerpApiConfig};
pub use store::{InMemoryVectorStore, PineconeClient, PineconeConfig};

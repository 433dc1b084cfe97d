//! Core domain model for company financial research
//!
//! This crate defines the types shared by every research agent and by the
//! orchestrator that drives them:
//!
//! - [`ResearchRequest`] with its [`PeriodFilter`] and agent selection
//! - [`DocumentChunk`] and [`RetrievalResult`] for filtered similarity search
//! - [`AgentOutcome`], the per-agent record that is always present in a report
//! - [`ResearchReport`], the assembled result of one request
//! - the [`ResearchAgent`] trait every specialised agent implements

pub mod agent;
pub mod chunk;
pub mod error;
pub mod outcome;
pub mod report;
pub mod request;
pub mod task;

pub use agent::{AgentReply, ResearchAgent};
pub use chunk::{ChunkMetadata, DocumentChunk, RetrievalResult, ScoredChunk};
pub use error::{AgentError, Error, Result};
pub use outcome::{
    AgentOutcome, ErrorKind, OutcomeStatus, Series, SeriesPoint, SourceRef, VisualPayload,
};
pub use report::{ReportSummary, ResearchReport};
pub use request::{AgentKind, PeriodFilter, ResearchRequest};
pub use task::AgentTask;

//! Request orchestration

pub mod lifecycle;
pub mod orchestrator;

pub use lifecycle::{RequestLifecycle, RequestState};
pub use orchestrator::{AgentSlot, Collaborators, ResearchOrchestrator};

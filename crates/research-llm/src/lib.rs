//! LLM access for research agents
//!
//! Provides a small provider abstraction over chat-completion APIs and the
//! [`NarrativeSynthesizer`] seam the agents use to turn evidence into prose:
//!
//! - Message and completion types (text only)
//! - [`LLMProvider`] trait with Anthropic and OpenAI implementations (feature-gated)
//! - [`LlmSynthesizer`], backed by any provider
//! - [`ExtractiveSynthesizer`], a deterministic offline fallback

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod synthesis;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use synthesis::{Evidence, ExtractiveSynthesizer, LlmSynthesizer, NarrativeSynthesizer};

// Provider implementations (feature-gated)
#[cfg(any(feature = "anthropic", feature = "openai"))]
pub mod providers;

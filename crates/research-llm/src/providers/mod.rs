//! Concrete LLM provider implementations

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicConfig, AnthropicProvider};

#[cfg(feature = "openai")]
pub use openai::{OpenAIConfig, OpenAIProvider};

//! Shared utilities for the research workspace
//!
//! Logging setup and small helpers for reading typed settings from the
//! environment.

pub mod config;
pub mod logging;

pub use config::{ConfigError, EnvSource};
pub use logging::{LogFormat, init_tracing, init_tracing_with};

//! Configuration and process-level utilities.

/// Tracing subscriber setup.
pub mod logging;
/// TOML configuration (`deepsearch.toml`).
pub mod toml_config;

pub use toml_config::{ConfigError, DeepSearchConfig};

//! # deepsearch - Iterative Deep Research
//!
//! An agent that answers questions by researching the web in a bounded loop:
//! at every step a language model decides whether to run another search or
//! to answer, searches are expanded into ranked evidence by crawling and
//! summarizing the top results concurrently, and the final answer is
//! streamed back.
//!
//! ## Overview
//!
//! deepsearch can be used in two ways:
//!
//! 1. **As a command-line tool** - Run `deepsearch ask "<question>"`
//! 2. **As a library** - Embed the [`AgentLoop`] in your own service
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use deepsearch::{AgentLoop, DeepSearchConfig, MemoryCacheStore, Message, RunOptions};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DeepSearchConfig::load_or_default("deepsearch.toml")?;
//!     let store = Arc::new(MemoryCacheStore::new(config.cache.store_config()));
//!     let agent = AgentLoop::from_config(&config, store).await?;
//!
//!     let answer = agent
//!         .run(vec![Message::user("What is new in Rust 1.80?")], RunOptions::new())
//!         .await?;
//!     println!("{}", answer.collect_text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API support |
//! | `all-llm` | Both providers |
//!
//! ## Modules
//!
//! - [`research`] - Agent loop, research context and search orchestration
//! - [`cache`] - Memoization decorator for expensive capabilities
//! - [`llm`] - LLM client implementations
//! - [`tools`] - Web search and crawling
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration and logging

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Memoization of capability calls.
pub mod cache;
/// Command-line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Iterative research loop.
pub mod research;
/// Web search and crawling.
pub mod tools;
/// Core types (messages, actions, evidence, errors).
pub mod types;
/// Configuration and logging utilities.
pub mod utils;

// Re-export commonly used types
pub use cache::{CacheStore, Cached, Capability, MemoryCacheStore};
pub use llm::{LLMClient, LLMClientFactory, Provider};
pub use research::{
    AgentLoop, AnnotationSink, AnswerStream, ResearchContext, RunOptions, RunTrace,
    SearchOrchestrator,
};
pub use types::{Action, Annotation, AppError, EvidenceItem, Message, NextAction, Result};
pub use utils::toml_config::DeepSearchConfig;

//! LLM Provider Clients
//!
//! This module provides a unified interface for the language models the
//! research loop depends on. Provider-specific implementations live behind
//! the [`LLMClient`] trait so decisions, summaries and answers can run on any
//! supported backend.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints
//!
//! # Example
//!
//! ```ignore
//! use deepsearch::llm::LLMClientFactory;
//!
//! let factory = LLMClientFactory::from_config(&config.llm)?;
//! let client = factory.create_default().await?;
//!
//! let response = client
//!     .generate_with_system("Answer briefly.", "What is 2+2?")
//!     .await?;
//! println!("{}", response);
//! ```

/// Core LLM client trait and provider selection.
pub mod client;

/// Ollama client
#[cfg(feature = "ollama")]
pub mod ollama;

/// OpenAI-compatible client
#[cfg(feature = "openai")]
pub mod openai;

pub use client::{LLMClient, LLMClientFactory, Provider, TokenStream};

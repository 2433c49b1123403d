//! LLM client abstraction and provider selection
//!
//! The research loop talks to language models for three things: choosing the
//! next action, summarizing scraped pages and streaming the final answer.
//! Every provider implements [`LLMClient`] so those callers never depend on a
//! specific backend.
//! - **Ollama**: local inference (default feature)
//! - **OpenAI**: OpenAI and compatible endpoints (`openai` feature)

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LlmConfig, ProviderKind};

/// Incremental text produced by a streaming generation
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Stream a completion with system prompt
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TokenStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs such as OpenRouter)
    OpenAI {
        /// API key read from the configured environment variable
        api_key: String,
        /// Endpoint base URL
        api_base: String,
        /// Model identifier
        model: String,
    },

    /// Ollama local LLM provider
    Ollama {
        /// Server URL, `scheme://host:port`
        base_url: String,
        /// Model tag
        model: String,
    },
}

impl Provider {
    /// Build the provider described by `config`, using `model` in place of the
    /// configured default model.
    pub fn from_config(config: &LlmConfig, model: &str) -> Result<Self> {
        match config.provider {
            ProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: config.base_url.clone(),
                model: model.to_string(),
            }),
            ProviderKind::OpenAI => {
                let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                    AppError::Configuration(format!(
                        "Environment variable '{}' is not set",
                        config.api_key_env
                    ))
                })?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: config.base_url.clone(),
                    model: model.to_string(),
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's Cargo feature was not compiled in.
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()).await?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; rebuild with `--features {}`",
                other.name(),
                other.feature()
            ))),
        }
    }

    /// Check if this provider was compiled in
    pub fn is_enabled(&self) -> bool {
        match self {
            Provider::OpenAI { .. } => cfg!(feature = "openai"),
            Provider::Ollama { .. } => cfg!(feature = "ollama"),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    fn feature(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "openai",
            Provider::Ollama { .. } => "ollama",
        }
    }

    /// Model this provider serves
    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Creates the clients used by one research run.
///
/// Summaries may run on a cheaper model than decisions and answers.
pub struct LLMClientFactory {
    default_provider: Provider,
    summarize_provider: Provider,
}

impl LLMClientFactory {
    /// Create a new factory with the specified providers
    pub fn new(default_provider: Provider, summarize_provider: Provider) -> Self {
        Self {
            default_provider,
            summarize_provider,
        }
    }

    /// Resolve both providers from the `[llm]` section
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let default_provider = Provider::from_config(config, &config.model)?;
        let summarize_model = config.summarize_model.as_deref().unwrap_or(&config.model);
        let summarize_provider = Provider::from_config(config, summarize_model)?;
        Ok(Self::new(default_provider, summarize_provider))
    }

    /// Client used for action decisions and final answers
    pub async fn create_default(&self) -> Result<Box<dyn LLMClient>> {
        self.default_provider.create_client().await
    }

    /// Client used for page summaries
    pub async fn create_summarizer(&self) -> Result<Box<dyn LLMClient>> {
        self.summarize_provider.create_client().await
    }

    /// Get a reference to the default provider
    pub fn default_provider(&self) -> &Provider {
        &self.default_provider
    }

    /// Provider used for page summaries
    pub fn summarize_provider(&self) -> &Provider {
        &self.summarize_provider
    }
}

//! TOML-based configuration for deepsearch
//!
//! Every field has a serde default, so an empty `deepsearch.toml` (or no file
//! at all, via [`DeepSearchConfig::default`]) yields a working local setup:
//! Ollama on `localhost:11434`, a step budget of 10 and a fan-out of 3.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::StoreConfig;
use crate::types::AppError;

/// Root configuration structure loaded from deepsearch.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeepSearchConfig {
    /// Language model provider and models
    #[serde(default)]
    pub llm: LlmConfig,

    /// Loop bounds, fan-out, deadlines and failure policies
    #[serde(default)]
    pub research: ResearchConfig,

    /// Summary memoization
    #[serde(default)]
    pub cache: CacheConfig,

    /// Page fetch retries
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Log level and format
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ============= LLM Configuration =============

/// Which LLM backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// OpenAI or a compatible endpoint
    #[serde(rename = "openai")]
    OpenAI,
}

/// `[llm]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend used for every model call
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model used for action decisions and final answers
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for page summaries (defaults to `model`)
    #[serde(default)]
    pub summarize_model: Option<String>,

    /// Provider endpoint; the OpenAI provider needs this set explicitly
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable containing the API key (OpenAI only)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_provider() -> ProviderKind {
    ProviderKind::Ollama
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            summarize_model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
        }
    }
}

// ============= Research Configuration =============

/// What to do when the search capability fails for a step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFailurePolicy {
    /// Abort the whole run
    #[default]
    Abort,
    /// Record an empty evidence batch for the step and keep going
    Degrade,
}

/// What to do when summarizing a scraped page fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFailurePolicy {
    /// Leave that item's summary absent; siblings are unaffected
    #[default]
    Isolate,
    /// Fail the batch, and with it the run
    Abort,
}

/// `[research]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Search actions allowed before an answer is forced
    #[serde(default = "default_step_budget")]
    pub step_budget: u32,

    /// Search results crawled and summarized per step
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,

    /// Deadline applied to each external call (unset = wait indefinitely)
    #[serde(default)]
    pub call_timeout_secs: Option<u64>,

    /// Reaction to a failed search step
    #[serde(default)]
    pub search_failure: SearchFailurePolicy,

    /// Reaction to a failed page summary
    #[serde(default)]
    pub summarize_failure: SummaryFailurePolicy,
}

/// Search steps allowed per run unless configured
pub const DEFAULT_STEP_BUDGET: u32 = 10;
/// Results crawled per search unless configured
pub const DEFAULT_FAN_OUT: usize = 3;

fn default_step_budget() -> u32 {
    DEFAULT_STEP_BUDGET
}

fn default_fan_out() -> usize {
    DEFAULT_FAN_OUT
}

impl ResearchConfig {
    /// `call_timeout_secs` as a [`Duration`]
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            step_budget: default_step_budget(),
            fan_out: default_fan_out(),
            call_timeout_secs: None,
            search_failure: SearchFailurePolicy::default(),
            summarize_failure: SummaryFailurePolicy::default(),
        }
    }
}

// ============= Cache Configuration =============

/// `[cache]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Wrap the summarizer in the cache
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Entry lifetime; unset keeps entries forever
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Capacity before least recently used entries are evicted
    #[serde(default)]
    pub max_entries: Option<usize>,

    /// Let concurrent identical misses share one computation
    #[serde(default)]
    pub single_flight: bool,
}

fn default_true() -> bool {
    true
}

impl CacheConfig {
    /// Retention settings for [`crate::cache::MemoryCacheStore`]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            ttl: self.ttl_secs.map(Duration::from_secs),
            max_entries: self.max_entries,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: None,
            max_entries: None,
            single_flight: false,
        }
    }
}

// ============= Crawler Configuration =============

/// `[crawler]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Retries after the first failed fetch of a URL
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff, doubled after every retry
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    500
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

// ============= Logging Configuration =============

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The given path does not exist
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file exists but could not be read
    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range or inconsistent
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A referenced environment variable is unset
    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl DeepSearchConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: DeepSearchConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(&path) {
            Err(ConfigError::FileNotFound(missing)) => {
                tracing::info!(path = %missing.display(), "No config file, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.research.step_budget == 0 {
            return Err(ConfigError::ValidationError(
                "research.step_budget must be at least 1".to_string(),
            ));
        }

        if self.research.fan_out == 0 {
            return Err(ConfigError::ValidationError(
                "research.fan_out must be at least 1".to_string(),
            ));
        }

        if self.research.call_timeout_secs == Some(0) {
            return Err(ConfigError::ValidationError(
                "research.call_timeout_secs must be positive when set".to_string(),
            ));
        }

        if self.cache.max_entries == Some(0) {
            return Err(ConfigError::ValidationError(
                "cache.max_entries must be positive when set".to_string(),
            ));
        }

        if self.llm.provider == ProviderKind::OpenAI {
            self.validate_env_var(&self.llm.api_key_env)?;
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        if std::env::var(name).is_err() {
            return Err(ConfigError::MissingEnvVar(name.to_string()));
        }
        Ok(())
    }
}

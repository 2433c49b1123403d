use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============= Conversation Types =============

/// A single turn of the conversation being researched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who authored the message
    pub role: MessageRole,
    /// Message text
    pub content: String,
    /// When the message was created
    pub timestamp: DateTime<Utc>,
    /// Annotations attached to an assistant message once a run has finished
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

impl Message {
    /// Create a message stamped with the current time
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            annotations: Vec::new(),
        }
    }

    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// An assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Author of a [`Message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions framing the conversation
    System,
    /// The person asking
    User,
    /// The research agent
    Assistant,
}

impl MessageRole {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

// ============= Agent Actions =============

/// The decision produced by one cycle of the agent loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Gather more evidence for `query`
    Search {
        /// Search engine query
        query: String,
    },
    /// Stop researching and answer
    Answer,
}

impl Action {
    /// Short name used in logs and annotations
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Search { .. } => "search",
            Action::Answer => "answer",
        }
    }
}

/// An [`Action`] together with the decider's human-readable framing of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAction {
    /// The decided action
    #[serde(flatten)]
    pub action: Action,
    /// One-line label for progress displays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Why the decider chose this action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl From<Action> for NextAction {
    fn from(action: Action) -> Self {
        Self {
            action,
            title: None,
            reasoning: None,
        }
    }
}

// ============= Evidence Types =============

/// One organic result returned by the search capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result title
    pub title: String,
    /// Result URL
    pub url: String,
    /// Search engine snippet
    pub snippet: String,
    /// Publication date, when the engine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Content retrieved for a search hit, or the failure marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "lowercase")]
pub enum ScrapedContent {
    /// Page text as fetched
    Scraped(String),
    /// The crawl failed or timed out
    Failed,
}

impl ScrapedContent {
    /// Placeholder rendered in place of content that could not be fetched
    pub const FAILURE_MARKER: &'static str = "[Failed to scrape]";

    /// Whether the crawl succeeded
    pub fn is_scraped(&self) -> bool {
        matches!(self, ScrapedContent::Scraped(_))
    }

    /// The page text, or [`ScrapedContent::FAILURE_MARKER`]
    pub fn as_text(&self) -> &str {
        match self {
            ScrapedContent::Scraped(text) => text,
            ScrapedContent::Failed => Self::FAILURE_MARKER,
        }
    }
}

/// A single ranked piece of evidence in a search batch.
///
/// `summary` is only ever `Some` when `scraped_content` is
/// [`ScrapedContent::Scraped`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// 1-based position in the original search ranking
    pub rank: usize,
    /// Title from the search hit
    pub title: String,
    /// URL from the search hit
    pub url: String,
    /// Snippet from the search hit
    pub snippet: String,
    /// Publication date, or the time of the search when unknown (RFC 3339)
    pub published_at: String,
    /// Crawl outcome
    pub scraped_content: ScrapedContent,
    /// Query-focused summary of the scraped page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ============= Annotations =============

/// Write-only progress events emitted while the agent loop runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Annotation {
    /// The decider chose an action; emitted before it is carried out
    NewAction {
        /// The chosen action with its framing
        action: NextAction,
    },
    /// A search step finished
    EvidenceBatch {
        /// The query that was searched
        query: String,
        /// One entry per evidence item, in rank order
        sources: Vec<SourceRef>,
    },
}

/// Compact reference to an [`EvidenceItem`] for progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// 1-based search rank
    pub rank: usize,
    /// Page title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Whether the page content was retrieved
    pub scraped: bool,
}

impl From<&EvidenceItem> for SourceRef {
    fn from(item: &EvidenceItem) -> Self {
        Self {
            rank: item.rank,
            title: item.title.clone(),
            url: item.url.clone(),
            scraped: item.scraped_content.is_scraped(),
        }
    }
}

// ============= Error Types =============

/// Errors surfaced by the research loop and its capabilities
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A language model call failed or returned something unusable
    #[error("LLM error: {0}")]
    LLM(String),

    /// Malformed input such as a search action without a query
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The search capability failed
    #[error("Search failed: {0}")]
    Search(String),

    /// A page could not be fetched
    #[error("Crawl failed: {0}")]
    Crawl(String),

    /// The cache store is unavailable
    #[error("Cache store error: {0}")]
    Cache(String),

    /// An external call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Anything else, including serialization failures
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("JSON error: {}", err))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, AppError>;

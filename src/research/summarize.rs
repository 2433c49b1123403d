use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::Capability;
use crate::llm::LLMClient;
use crate::types::{AppError, Result};

/// Everything needed to summarize one scraped page.
///
/// The whole payload except `trace_id` forms the cache key, so two runs
/// asking about the same page in the same conversation share a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizeRequest {
    /// Research query the page was found for
    pub query: String,
    /// Search result title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Search engine snippet
    pub snippet: String,
    /// Publication date, or `unknown`
    pub published_at: String,
    /// Page text to summarize
    pub scraped_content: String,
    /// Rendered conversation, so summaries can stay on topic
    pub conversation_history: String,
    /// Run the request belongs to; never part of the cache key
    #[serde(skip)]
    pub trace_id: Option<Uuid>,
}

const SUMMARIZE_INSTRUCTIONS: &str = r#"You are a research extraction specialist. You receive a research topic and the raw content of one web page. Write a detailed synthesis of everything on the page that bears on the topic.

Keep facts, figures, dates, methods and claims together with the context they came from (say "a 2024 survey of 150 teams", not "a recent survey"). Keep the source's technical vocabulary. Write connected prose with paragraph breaks only between major themes, not bullet lists.

If the page says nothing about part of the topic, state that plainly. Never invent information and never fill gaps from outside knowledge."#;

/// Summarizes pages with a language model
pub struct LlmSummarizer {
    llm: Arc<dyn LLMClient>,
}

impl LlmSummarizer {
    /// Summarize with `llm`
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// User prompt for one page
    pub fn build_prompt(request: &SummarizeRequest) -> String {
        format!(
            "Research Topic: {}\n\n\
             Source Title: {}\n\
             Source Date: {}\n\
             Source URL: {}\n\
             Source Snippet: {}\n\n\
             Conversation History:\n{}\n\n\
             Raw Web Content:\n{}\n\n\
             ---\n\nSYNTHESIS:",
            request.query,
            request.title,
            request.published_at,
            request.url,
            request.snippet,
            request.conversation_history,
            request.scraped_content,
        )
    }
}

#[async_trait]
impl Capability for LlmSummarizer {
    type Input = SummarizeRequest;
    type Output = String;

    async fn invoke(&self, request: &SummarizeRequest) -> Result<String> {
        tracing::debug!(
            url = %request.url,
            trace_id = ?request.trace_id,
            model = self.llm.model_name(),
            "Summarizing page"
        );

        let summary = self
            .llm
            .generate_with_system(SUMMARIZE_INSTRUCTIONS, &Self::build_prompt(request))
            .await?;

        let summary = summary.trim();
        if summary.is_empty() {
            return Err(AppError::LLM(format!(
                "Empty summary for {}",
                request.url
            )));
        }
        Ok(summary.to_string())
    }
}

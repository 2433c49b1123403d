use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::capabilities::ActionDecider;
use super::context::ResearchContext;
use super::trace::RunTrace;
use crate::llm::LLMClient;
use crate::types::{Action, AppError, NextAction, Result};

const DECIDE_INSTRUCTIONS: &str = r#"You are the planner of a research assistant that answers questions using web search. At every step you choose exactly one action:

1. "search": run a new web search. The top results are scraped and summarized for you. Use it when the evidence so far cannot fully answer the question, when sources disagree, or when the question depends on recent events.
2. "answer": stop researching. Use it when the evidence gathered so far is enough to answer well, or when further searches keep returning the same information.

Never repeat a query you have already issued. Prefer specific, targeted queries over broad ones.

Respond with a single JSON object and nothing else:
{"type": "search", "query": "<search query>", "title": "<short description of the step>", "reasoning": "<why this step>"}
or
{"type": "answer", "title": "<short description of the step>", "reasoning": "<why you can answer now>"}"#;

/// Raw shape of the planner's reply before validation
#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Decode the planner's free-form reply into a [`NextAction`].
///
/// Accepts a bare JSON object or one wrapped in a Markdown code fence. Any
/// `type` other than `search` or `answer` is rejected. A `search` without a
/// query decodes to an empty query, which the agent loop rejects.
pub fn parse_next_action(raw: &str) -> Result<NextAction> {
    let json = extract_json_object(raw).ok_or_else(|| {
        AppError::LLM(format!("Planner reply contains no JSON object: {}", truncate(raw)))
    })?;

    let parsed: RawAction = serde_json::from_str(json)
        .map_err(|e| AppError::LLM(format!("Malformed planner reply: {}", e)))?;

    let action = match parsed.kind.trim().to_ascii_lowercase().as_str() {
        "search" => Action::Search {
            query: parsed.query.unwrap_or_default().trim().to_string(),
        },
        "answer" => Action::Answer,
        other => {
            return Err(AppError::LLM(format!(
                "Unknown action type '{}' in planner reply",
                other
            )))
        }
    };

    Ok(NextAction {
        action,
        title: parsed.title.filter(|t| !t.trim().is_empty()),
        reasoning: parsed.reasoning.filter(|r| !r.trim().is_empty()),
    })
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn truncate(raw: &str) -> String {
    raw.chars().take(200).collect()
}

/// Chooses the next action with a language model
pub struct LlmActionDecider {
    llm: Arc<dyn LLMClient>,
}

impl LlmActionDecider {
    /// Decide with `llm`
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// Prompt listing the conversation, the evidence so far and the remaining budget
    pub fn build_prompt(context: &ResearchContext) -> String {
        let mut prompt = format!(
            "Current date: {}\n\nStep {} of at most {}.\n\n",
            Utc::now().format("%Y-%m-%d"),
            context.step() + 1,
            context.step_budget()
        );

        let previous: Vec<_> = context.queries().collect();
        if !previous.is_empty() {
            prompt.push_str("Queries already issued:\n");
            for query in previous {
                prompt.push_str(&format!("- {}\n", query));
            }
            prompt.push('\n');
        }

        let evidence = context.search_history();
        if !evidence.is_empty() {
            prompt.push_str("Evidence gathered so far:\n\n");
            prompt.push_str(&evidence);
            prompt.push_str("\n\n");
        }

        prompt.push_str("Conversation:\n\n");
        prompt.push_str(&context.message_history());
        prompt.push_str("\n\nChoose the next action.");
        prompt
    }
}

#[async_trait]
impl ActionDecider for LlmActionDecider {
    async fn next_action(&self, context: &ResearchContext, trace: &RunTrace) -> Result<NextAction> {
        let reply = self
            .llm
            .generate_with_system(DECIDE_INSTRUCTIONS, &Self::build_prompt(context))
            .await?;

        let next = parse_next_action(&reply)?;
        tracing::debug!(
            trace_id = %trace.id(),
            action = next.action.kind(),
            title = next.title.as_deref().unwrap_or(""),
            "Planner chose next action"
        );
        Ok(next)
    }
}

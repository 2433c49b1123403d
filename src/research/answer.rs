use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use super::capabilities::AnswerGenerator;
use super::context::ResearchContext;
use super::trace::RunTrace;
use crate::llm::{LLMClient, TokenStream};
use crate::types::Result;

const ANSWER_INSTRUCTIONS: &str = r#"You are a research assistant answering the user's latest question from the evidence gathered by web searches.

Guidelines:
- Ground every claim in the evidence. Cite sources inline as Markdown links, e.g. [Tokio docs](https://tokio.rs).
- When sources disagree, say so and name which source says what.
- Be direct: lead with the answer, then the supporting detail.
- If the evidence does not cover part of the question, say what is missing instead of guessing."#;

const FINAL_ATTEMPT_NOTE: &str = "\n\nThe research budget is exhausted, so the evidence may be incomplete. Give your best answer with what is available and state clearly which parts remain uncertain.";

/// Streams the final answer with a language model
pub struct LlmAnswerGenerator {
    llm: Arc<dyn LLMClient>,
}

impl LlmAnswerGenerator {
    /// Answer with `llm`
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self { llm }
    }

    /// System prompt; a forced answer also asks the model to flag gaps
    pub fn system_prompt(is_final: bool) -> String {
        if is_final {
            format!("{}{}", ANSWER_INSTRUCTIONS, FINAL_ATTEMPT_NOTE)
        } else {
            ANSWER_INSTRUCTIONS.to_string()
        }
    }

    /// User prompt carrying the conversation and every evidence batch
    pub fn build_prompt(context: &ResearchContext) -> String {
        let evidence = context.search_history();
        format!(
            "Current date: {}\n\nConversation:\n\n{}\n\nEvidence:\n\n{}\n\nAnswer the user's latest message.",
            Utc::now().format("%Y-%m-%d"),
            context.message_history(),
            if evidence.is_empty() {
                "No searches were run."
            } else {
                evidence.as_str()
            },
        )
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn answer(
        &self,
        context: &ResearchContext,
        is_final: bool,
        trace: &RunTrace,
    ) -> Result<TokenStream> {
        tracing::info!(
            trace_id = %trace.id(),
            is_final,
            batches = context.searches().len(),
            model = self.llm.model_name(),
            "Generating answer"
        );

        self.llm
            .stream_with_system(&Self::system_prompt(is_final), &Self::build_prompt(context))
            .await
    }
}

use crate::types::{EvidenceItem, Message, MessageRole, ScrapedContent};
use crate::utils::toml_config::DEFAULT_STEP_BUDGET;

const SUMMARY_UNAVAILABLE: &str = "[Summary unavailable]";

/// The evidence gathered for one search action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchBatch {
    /// Query the evidence was gathered for
    pub query: String,
    /// Evidence in search rank order
    pub results: Vec<EvidenceItem>,
}

/// Step-scoped state of one research run.
///
/// Owned by a single run and mutated only through [`report_search`] and
/// [`increment_step`]. Conversation messages and evidence batches are
/// append-only, and the step counter never decreases, so the textual
/// projections used in prompts are a pure function of the append history.
///
/// [`report_search`]: ResearchContext::report_search
/// [`increment_step`]: ResearchContext::increment_step
#[derive(Debug, Clone)]
pub struct ResearchContext {
    messages: Vec<Message>,
    searches: Vec<SearchBatch>,
    step: u32,
    step_budget: u32,
}

impl ResearchContext {
    /// Fresh context over `messages` allowing `step_budget` searches
    pub fn new(messages: Vec<Message>, step_budget: u32) -> Self {
        Self {
            messages,
            searches: Vec::new(),
            step: 0,
            step_budget,
        }
    }

    /// Context with the default step budget
    pub fn with_default_budget(messages: Vec<Message>) -> Self {
        Self::new(messages, DEFAULT_STEP_BUDGET)
    }

    /// Conversation so far, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume the context, keeping only the conversation
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// The conversation rendered for prompts, one tagged block per message
    pub fn message_history(&self) -> String {
        self.messages
            .iter()
            .map(|message| {
                let tag = match message.role {
                    MessageRole::System => "System",
                    MessageRole::User => "User",
                    MessageRole::Assistant => "Assistant",
                };
                format!("<{tag}>{}</{tag}>", message.content)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Append the evidence gathered for `query`
    pub fn report_search(&mut self, query: impl Into<String>, results: Vec<EvidenceItem>) {
        self.searches.push(SearchBatch {
            query: query.into(),
            results,
        });
    }

    /// Evidence batches in the order they were gathered
    pub fn searches(&self) -> &[SearchBatch] {
        &self.searches
    }

    /// All evidence rendered for prompts.
    ///
    /// Items whose scrape failed keep their search metadata and show the
    /// failure marker in place of a summary; scraped items without a summary
    /// show a placeholder.
    pub fn search_history(&self) -> String {
        self.searches
            .iter()
            .map(|batch| {
                let mut section = format!("## Query: \"{}\"", batch.query);
                if batch.results.is_empty() {
                    section.push_str("\n\nNo results were retrieved for this query.");
                }
                for item in &batch.results {
                    section.push_str(&format!(
                        "\n\n### {} - {}\n\n{}\n\n{}\n\n<summary>\n\n{}\n\n</summary>",
                        item.published_at,
                        item.title,
                        item.url,
                        item.snippet,
                        item.summary.as_deref().unwrap_or(match &item.scraped_content {
                            ScrapedContent::Failed => ScrapedContent::FAILURE_MARKER,
                            // Raw pages are too long for prompts
                            ScrapedContent::Scraped(_) => SUMMARY_UNAVAILABLE,
                        }),
                    ));
                }
                section
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Queries already issued, oldest first
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.searches.iter().map(|batch| batch.query.as_str())
    }

    /// Count a completed search step
    pub fn increment_step(&mut self) {
        self.step += 1;
    }

    /// Search steps completed so far
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Maximum number of search steps
    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    /// Whether the step budget is exhausted
    pub fn should_stop(&self) -> bool {
        self.step >= self.step_budget
    }
}

//! Iterative web research
//!
//! A research run alternates between deciding what to do next and gathering
//! evidence, until the model decides it can answer or the step budget runs
//! out.
//!
//! # Architecture
//!
//! - [`agent::AgentLoop`] - The decide/search/answer state machine
//! - [`context::ResearchContext`] - Conversation, evidence batches and step counter
//! - [`orchestrator::SearchOrchestrator`] - Concurrent crawl and summarize for one query
//! - [`capabilities`] - The seams the loop calls through (decide, search, crawl, answer)
//! - [`events::AnnotationSink`] - One-way progress annotations for callers
//! - [`trace::RunTrace`] - Per-run tracing span and counters
//!
//! # Usage
//!
//! ```ignore
//! use deepsearch::research::{AgentLoop, RunOptions};
//!
//! let agent = AgentLoop::from_config(&config, store).await?;
//! let answer = agent
//!     .run(vec![Message::user("What changed in Rust 1.80?")], RunOptions::new())
//!     .await?;
//! println!("{}", answer.collect_text().await?);
//! ```

/// The research state machine and its streamed answer.
pub mod agent;
/// LLM-backed final answer generation.
pub mod answer;
/// Capability traits and call deadlines.
pub mod capabilities;
/// Accumulated research state.
pub mod context;
/// LLM-backed next-action selection.
pub mod decide;
/// Progress annotation channel.
pub mod events;
/// Per-query search, crawl and summarize fan-out.
pub mod orchestrator;
/// LLM-backed page summarization.
pub mod summarize;
/// Per-run tracing context.
pub mod trace;

pub use agent::{AgentLoop, AnswerStream, OnFinish, RunOptions};
pub use answer::LlmAnswerGenerator;
pub use capabilities::{ActionDecider, AnswerGenerator, Crawler, Summarizer, WebSearch};
pub use context::{ResearchContext, SearchBatch};
pub use decide::{parse_next_action, LlmActionDecider};
pub use events::AnnotationSink;
pub use orchestrator::SearchOrchestrator;
pub use summarize::{LlmSummarizer, SummarizeRequest};
pub use trace::{RunTrace, TraceSummary};

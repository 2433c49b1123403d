//! External capabilities consumed by the research loop.
//!
//! Each trait is the boundary to a service the loop does not implement
//! itself. Production implementations live in [`crate::research::decide`],
//! [`crate::research::summarize`], [`crate::research::answer`] and
//! [`crate::tools::web`]; tests substitute their own.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::context::ResearchContext;
use super::summarize::SummarizeRequest;
use super::trace::RunTrace;
use crate::cache::Capability;
use crate::llm::TokenStream;
use crate::types::{AppError, NextAction, Result, SearchHit};

/// Chooses what the loop does next.
///
/// Failure is fatal to the run.
#[async_trait]
pub trait ActionDecider: Send + Sync {
    /// Decide from everything gathered so far
    async fn next_action(&self, context: &ResearchContext, trace: &RunTrace)
        -> Result<NextAction>;
}

/// Web search returning organic results in rank order.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `count` results for `query`, best first
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>>;
}

/// Retrieves the readable content of one page.
///
/// The orchestrator calls this concurrently for every URL in a batch and
/// isolates failures per URL.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Fetch `url` and return its text
    async fn crawl(&self, url: &str) -> Result<String>;
}

/// Synthesizes one scraped page against the research query.
///
/// Expressed as a [`Capability`] so it can be wrapped by
/// [`crate::cache::Cached`].
pub type Summarizer = dyn Capability<Input = SummarizeRequest, Output = String>;

/// Streams the final answer from everything gathered so far.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// `is_final` is set when the step budget forced the answer
    async fn answer(
        &self,
        context: &ResearchContext,
        is_final: bool,
        trace: &RunTrace,
    ) -> Result<TokenStream>;
}

/// Await `fut`, failing with [`AppError::Timeout`] once `timeout` elapses.
pub(crate) async fn with_deadline<T, F>(timeout: Option<Duration>, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        None => fut.await,
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| AppError::Timeout(format!("{} did not finish within {:?}", what, limit)))?,
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::task::JoinSet;
use tracing::Instrument;

use super::capabilities::{with_deadline, Crawler, Summarizer, WebSearch};
use super::summarize::SummarizeRequest;
use super::trace::RunTrace;
use crate::cache::Capability;
use crate::types::{AppError, EvidenceItem, Result, ScrapedContent, SearchHit};
use crate::utils::toml_config::{SearchFailurePolicy, SummaryFailurePolicy, DEFAULT_FAN_OUT};

/// Turns one query into a ranked batch of evidence.
///
/// The top `fan_out` search hits are crawled concurrently, then every
/// successfully crawled page is summarized concurrently. A failed crawl only
/// marks its own item; the batch always has one item per hit, in search
/// rank order regardless of which task finishes first.
pub struct SearchOrchestrator {
    search: Arc<dyn WebSearch>,
    crawler: Arc<dyn Crawler>,
    summarizer: Arc<Summarizer>,
    fan_out: usize,
    call_timeout: Option<Duration>,
    search_failure: SearchFailurePolicy,
    summarize_failure: SummaryFailurePolicy,
}

impl SearchOrchestrator {
    /// Orchestrator with the default fan-out, no deadlines and the default failure policies
    pub fn new(
        search: Arc<dyn WebSearch>,
        crawler: Arc<dyn Crawler>,
        summarizer: Arc<Summarizer>,
    ) -> Self {
        Self {
            search,
            crawler,
            summarizer,
            fan_out: DEFAULT_FAN_OUT,
            call_timeout: None,
            search_failure: SearchFailurePolicy::default(),
            summarize_failure: SummaryFailurePolicy::default(),
        }
    }

    /// Results processed per search; at least one
    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Deadline for each search, crawl and summarize call
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Reaction to a failed search
    pub fn with_search_failure(mut self, policy: SearchFailurePolicy) -> Self {
        self.search_failure = policy;
        self
    }

    /// Reaction to a failed summary
    pub fn with_summarize_failure(mut self, policy: SummaryFailurePolicy) -> Self {
        self.summarize_failure = policy;
        self
    }

    /// Configured fan-out
    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Search, crawl and summarize evidence for `query`.
    ///
    /// `conversation_history` is the rendered conversation passed to every
    /// summary.
    pub async fn gather(
        &self,
        query: &str,
        conversation_history: &str,
        trace: &RunTrace,
    ) -> Result<Vec<EvidenceItem>> {
        trace.record_search();

        let mut hits = match with_deadline(
            self.call_timeout,
            "search",
            self.search.search(query, self.fan_out),
        )
        .await
        {
            Ok(hits) => hits,
            Err(e) => match self.search_failure {
                SearchFailurePolicy::Abort => return Err(e),
                SearchFailurePolicy::Degrade => {
                    tracing::warn!(query = %query, error = %e, "Search failed, continuing without evidence");
                    return Ok(Vec::new());
                }
            },
        };
        hits.truncate(self.fan_out);

        tracing::info!(query = %query, results = hits.len(), "Search returned results");

        let contents = self.crawl_all(&hits).await;
        let failed = contents.iter().filter(|c| !c.is_scraped()).count();
        trace.record_failed_crawls(failed as u32);

        let summaries = self
            .summarize_all(query, conversation_history, &hits, &contents, trace)
            .await?;
        trace.record_summaries(summaries.iter().flatten().count() as u32);

        let published_fallback = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

        Ok(hits
            .into_iter()
            .zip(contents)
            .zip(summaries)
            .enumerate()
            .map(|(i, ((hit, scraped_content), summary))| EvidenceItem {
                rank: i + 1,
                title: hit.title,
                url: hit.url,
                snippet: hit.snippet,
                published_at: hit
                    .published_at
                    .unwrap_or_else(|| published_fallback.clone()),
                scraped_content,
                summary,
            })
            .collect())
    }

    /// Crawl every hit concurrently; slot `i` holds the outcome for hit `i`.
    async fn crawl_all(&self, hits: &[SearchHit]) -> Vec<ScrapedContent> {
        let mut slots = vec![ScrapedContent::Failed; hits.len()];
        let mut set = JoinSet::new();

        for (i, hit) in hits.iter().enumerate() {
            let crawler = Arc::clone(&self.crawler);
            let url = hit.url.clone();
            let timeout = self.call_timeout;
            let span = tracing::debug_span!("crawl", rank = i + 1, url = %url);

            set.spawn(
                async move {
                    let result = with_deadline(timeout, "crawl", crawler.crawl(&url)).await;
                    (i, url, result)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((i, _, Ok(content))) => slots[i] = ScrapedContent::Scraped(content),
                Ok((i, url, Err(e))) => {
                    tracing::warn!(rank = i + 1, url = %url, error = %e, "Crawl failed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Crawl task did not complete");
                }
            }
        }

        slots
    }

    /// Summarize every successfully crawled page concurrently.
    async fn summarize_all(
        &self,
        query: &str,
        conversation_history: &str,
        hits: &[SearchHit],
        contents: &[ScrapedContent],
        trace: &RunTrace,
    ) -> Result<Vec<Option<String>>> {
        let mut summaries = vec![None; hits.len()];
        let mut set = JoinSet::new();

        for (i, (hit, content)) in hits.iter().zip(contents).enumerate() {
            let ScrapedContent::Scraped(text) = content else {
                continue;
            };

            let request = SummarizeRequest {
                query: query.to_string(),
                title: hit.title.clone(),
                url: hit.url.clone(),
                snippet: hit.snippet.clone(),
                // A stable placeholder keeps undated pages cacheable
                published_at: hit
                    .published_at
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
                scraped_content: text.clone(),
                conversation_history: conversation_history.to_string(),
                trace_id: Some(trace.id()),
            };
            let summarizer = Arc::clone(&self.summarizer);
            let timeout = self.call_timeout;
            let span = tracing::debug_span!("summarize", rank = i + 1, url = %hit.url);

            set.spawn(
                async move {
                    let result =
                        with_deadline(timeout, "summarize", summarizer.invoke(&request)).await;
                    (i, request.url, result)
                }
                .instrument(span),
            );
        }

        while let Some(joined) = set.join_next().await {
            let (i, url, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    let err = AppError::Internal(format!("Summarize task did not complete: {}", e));
                    match self.summarize_failure {
                        SummaryFailurePolicy::Isolate => {
                            tracing::warn!(error = %err, "Dropping summary");
                            continue;
                        }
                        SummaryFailurePolicy::Abort => return Err(err),
                    }
                }
            };

            match result {
                Ok(summary) => summaries[i] = Some(summary),
                Err(e) => match self.summarize_failure {
                    SummaryFailurePolicy::Isolate => {
                        tracing::warn!(rank = i + 1, url = %url, error = %e, "Summarize failed, keeping item without summary");
                    }
                    SummaryFailurePolicy::Abort => return Err(e),
                },
            }
        }

        Ok(summaries)
    }
}

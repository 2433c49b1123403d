//! Integration tests for per-query evidence gathering
//!
//! Covers rank preservation under out-of-order completion, per-item crawl
//! failure isolation, the search and summarize failure policies and per-call
//! deadlines.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use tokio::time::Instant;

use common::mocks::{
    orchestrator, page, summary, url, CountingSearch, CountingSummarizer, LatencyCrawler,
};
use deepsearch::research::RunTrace;
use deepsearch::types::{AppError, ScrapedContent};
use deepsearch::utils::toml_config::{SearchFailurePolicy, SummaryFailurePolicy};

const HISTORY: &str = "<User>What changed in Rust 1.80?</User>";

fn mocks(
    search: CountingSearch,
    crawler: LatencyCrawler,
    summarizer: CountingSummarizer,
) -> (Arc<CountingSearch>, Arc<LatencyCrawler>, Arc<CountingSummarizer>) {
    (Arc::new(search), Arc::new(crawler), Arc::new(summarizer))
}

#[tokio::test]
async fn test_one_failed_crawl_is_isolated() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new().failing(url(2)),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler.clone(), summarizer.clone());

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(
        items.iter().map(|i| i.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    assert_eq!(items[0].scraped_content, ScrapedContent::Scraped(page(&url(1))));
    assert_eq!(items[0].summary, Some(summary(&url(1))));

    assert_eq!(items[1].scraped_content, ScrapedContent::Failed);
    assert_eq!(items[1].scraped_content.as_text(), "[Failed to scrape]");
    assert_eq!(items[1].summary, None);

    assert_eq!(items[2].summary, Some(summary(&url(3))));

    assert_eq!(crawler.calls(), 3);
    assert_eq!(summarizer.calls(), 2);
}

#[tokio::test]
async fn test_rank_order_survives_reversed_latency() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new()
            .with_delay(url(1), Duration::from_millis(90))
            .with_delay(url(2), Duration::from_millis(45)),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer);

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();

    let urls: Vec<_> = items.iter().map(|i| i.url.clone()).collect();
    assert_eq!(urls, vec![url(1), url(2), url(3)]);
    for item in &items {
        assert_eq!(item.summary, Some(summary(&item.url)));
        assert_eq!(item.title, format!("Result {}", item.rank));
    }
}

#[tokio::test]
async fn test_crawls_run_concurrently() {
    let delay = Duration::from_millis(200);
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new()
            .with_delay(url(1), delay)
            .with_delay(url(2), delay)
            .with_delay(url(3), delay),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer);

    let started = Instant::now();
    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();

    assert_eq!(items.len(), 3);
    assert!(
        started.elapsed() < delay * 2,
        "crawls ran sequentially: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_fan_out_limits_results() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(10),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );

    let orch = orchestrator(search.clone(), crawler.clone(), summarizer.clone());
    assert_eq!(orch.fan_out(), 3);
    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert_eq!(items.len(), 3);

    let orch = orchestrator(search, crawler.clone(), summarizer).with_fan_out(5);
    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert_eq!(items.len(), 5);
    assert_eq!(crawler.calls(), 8);
}

#[tokio::test]
async fn test_no_results_yields_empty_batch() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(0),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler.clone(), summarizer);

    let items = orch.gather("obscure", HISTORY, &RunTrace::default()).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(crawler.calls(), 0);
}

#[tokio::test]
async fn test_missing_published_at_falls_back_to_timestamp() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(2),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer);

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert_eq!(items[0].published_at, "2024-01-01");
    assert!(DateTime::parse_from_rfc3339(&items[1].published_at).is_ok());
}

#[tokio::test]
async fn test_trace_id_reaches_summarizer() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer.clone());
    let trace = RunTrace::default();

    orch.gather("rust", HISTORY, &trace).await.unwrap();

    let ids = summarizer.trace_ids();
    assert_eq!(ids.len(), 3);
    assert!(ids.iter().all(|id| *id == Some(trace.id())));

    let counts = trace.summary();
    assert_eq!(counts.searches, 1);
    assert_eq!(counts.failed_crawls, 0);
    assert_eq!(counts.summaries, 3);
}

// ============= Failure Policies =============

#[tokio::test]
async fn test_summarize_failure_is_isolated_by_default() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new(),
        CountingSummarizer::new().failing(url(1)),
    );
    let orch = orchestrator(search, crawler, summarizer);

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert!(items[0].scraped_content.is_scraped());
    assert_eq!(items[0].summary, None);
    assert_eq!(items[1].summary, Some(summary(&url(2))));
    assert_eq!(items[2].summary, Some(summary(&url(3))));
}

#[tokio::test]
async fn test_summarize_failure_aborts_when_configured() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new(),
        CountingSummarizer::new().failing(url(3)),
    );
    let orch = orchestrator(search, crawler, summarizer)
        .with_summarize_failure(SummaryFailurePolicy::Abort);

    let err = orch
        .gather("rust", HISTORY, &RunTrace::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::LLM(_)));
}

#[tokio::test]
async fn test_search_failure_aborts_by_default() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::failing(),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer);

    let err = orch
        .gather("rust", HISTORY, &RunTrace::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Search(_)));
}

#[tokio::test]
async fn test_search_failure_degrades_to_empty_batch() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::failing(),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler.clone(), summarizer)
        .with_search_failure(SearchFailurePolicy::Degrade);

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert!(items.is_empty());
    assert_eq!(crawler.calls(), 0);
}

// ============= Deadlines =============

#[tokio::test]
async fn test_slow_crawl_becomes_failure_marker() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(3),
        LatencyCrawler::new().with_delay(url(1), Duration::from_secs(5)),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer.clone())
        .with_call_timeout(Some(Duration::from_millis(50)));

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert_eq!(items[0].scraped_content, ScrapedContent::Failed);
    assert_eq!(items[0].summary, None);
    assert!(items[1].scraped_content.is_scraped());
    assert_eq!(summarizer.calls(), 2);
}

#[tokio::test]
async fn test_slow_search_times_out() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::slow(3, Duration::from_secs(5)),
        LatencyCrawler::new(),
        CountingSummarizer::new(),
    );
    let orch = orchestrator(search, crawler, summarizer)
        .with_call_timeout(Some(Duration::from_millis(50)));

    let err = orch
        .gather("rust", HISTORY, &RunTrace::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Timeout(_)));
}

#[tokio::test]
async fn test_slow_summaries_are_dropped_under_isolate() {
    let (search, crawler, summarizer) = mocks(
        CountingSearch::with_hits(2),
        LatencyCrawler::new(),
        CountingSummarizer::new().with_delay(Duration::from_secs(5)),
    );
    let orch = orchestrator(search, crawler, summarizer)
        .with_call_timeout(Some(Duration::from_millis(50)));

    let items = orch.gather("rust", HISTORY, &RunTrace::default()).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.scraped_content.is_scraped() && i.summary.is_none()));
}

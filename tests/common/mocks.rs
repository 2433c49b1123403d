//! Mock implementations for testing.
//!
//! Hand-written capabilities with call counters, scripted decisions and
//! artificial latency, shared across the integration test files.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use deepsearch::cache::Capability;
use deepsearch::llm::{LLMClient, TokenStream};
use deepsearch::research::{
    ActionDecider, AgentLoop, AnswerGenerator, Crawler, ResearchContext, RunTrace,
    SearchOrchestrator, SummarizeRequest, WebSearch,
};
use deepsearch::types::{Action, AppError, NextAction, Result, SearchHit};

// ============= Decide-Action =============

enum Script {
    /// Play these actions in order, then answer
    Actions(VecDeque<Action>),
    /// Search with a fresh query every step
    AlwaysSearch,
    Fail,
}

/// Decider that follows a fixed script.
pub struct ScriptedDecider {
    script: Mutex<Script>,
    calls: AtomicUsize,
}

impl ScriptedDecider {
    pub fn new(actions: Vec<Action>) -> Self {
        Self::with_script(Script::Actions(actions.into()))
    }

    pub fn always_search() -> Self {
        Self::with_script(Script::AlwaysSearch)
    }

    pub fn answer_immediately() -> Self {
        Self::new(vec![Action::Answer])
    }

    pub fn failing() -> Self {
        Self::with_script(Script::Fail)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionDecider for ScriptedDecider {
    async fn next_action(&self, context: &ResearchContext, _trace: &RunTrace) -> Result<NextAction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let action = match &mut *self.script.lock() {
            Script::Actions(queue) => queue.pop_front().unwrap_or(Action::Answer),
            Script::AlwaysSearch => Action::Search {
                query: format!("query {}", context.step() + 1),
            },
            Script::Fail => return Err(AppError::LLM("Mock decider failure".to_string())),
        };
        Ok(NextAction {
            action,
            title: Some("scripted".to_string()),
            reasoning: None,
        })
    }
}

pub fn search(query: &str) -> Action {
    Action::Search {
        query: query.to_string(),
    }
}

// ============= Search =============

/// Search returning `hits` results per query, recording every query.
pub struct CountingSearch {
    hits: usize,
    fail: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl CountingSearch {
    pub fn with_hits(hits: usize) -> Self {
        Self {
            hits,
            fail: false,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_hits(0)
        }
    }

    pub fn slow(hits: usize, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::with_hits(hits)
        }
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

pub fn url(i: usize) -> String {
    format!("https://example.com/{}", i)
}

#[async_trait]
impl WebSearch for CountingSearch {
    async fn search(&self, query: &str, count: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(AppError::Search("Mock search failure".to_string()));
        }
        Ok((1..=self.hits.min(count))
            .map(|i| SearchHit {
                title: format!("Result {}", i),
                url: url(i),
                snippet: format!("Snippet {}", i),
                published_at: (i == 1).then(|| "2024-01-01".to_string()),
            })
            .collect())
    }
}

// ============= Crawl =============

/// Crawler with per-URL latency and failures.
#[derive(Default)]
pub struct LatencyCrawler {
    delays: HashMap<String, Duration>,
    failures: HashSet<String>,
    calls: AtomicUsize,
}

impl LatencyCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn page(url: &str) -> String {
    format!("Content of {}", url)
}

#[async_trait]
impl Crawler for LatencyCrawler {
    async fn crawl(&self, url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failures.contains(url) {
            return Err(AppError::Crawl(format!("Mock crawl failure for {}", url)));
        }
        Ok(page(url))
    }
}

// ============= Summarize =============

/// Summarizer counting invocations, with optional per-URL failures.
#[derive(Default)]
pub struct CountingSummarizer {
    failures: HashSet<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    trace_ids: Mutex<Vec<Option<uuid::Uuid>>>,
}

impl CountingSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, url: impl Into<String>) -> Self {
        self.failures.insert(url.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn trace_ids(&self) -> Vec<Option<uuid::Uuid>> {
        self.trace_ids.lock().clone()
    }
}

pub fn summary(url: &str) -> String {
    format!("Summary of {}", url)
}

#[async_trait]
impl Capability for CountingSummarizer {
    type Input = SummarizeRequest;
    type Output = String;

    async fn invoke(&self, request: &SummarizeRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.trace_ids.lock().push(request.trace_id);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.contains(&request.url) {
            return Err(AppError::LLM(format!("Mock summarize failure for {}", request.url)));
        }
        Ok(summary(&request.url))
    }
}

// ============= Generate-Answer =============

/// What the answerer saw when it was called
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerCall {
    pub is_final: bool,
    pub batches: usize,
    pub queries: Vec<String>,
}

/// Answerer that records every call and streams fixed chunks.
pub struct RecordingAnswerer {
    chunks: Vec<String>,
    fail_stream: bool,
    calls: Mutex<Vec<AnswerCall>>,
}

impl RecordingAnswerer {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail_stream: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Streams the chunks, then an error
    pub fn failing_stream(chunks: &[&str]) -> Self {
        Self {
            fail_stream: true,
            ..Self::new(chunks)
        }
    }

    pub fn calls(&self) -> Vec<AnswerCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AnswerGenerator for RecordingAnswerer {
    async fn answer(
        &self,
        context: &ResearchContext,
        is_final: bool,
        _trace: &RunTrace,
    ) -> Result<TokenStream> {
        self.calls.lock().push(AnswerCall {
            is_final,
            batches: context.searches().len(),
            queries: context.queries().map(String::from).collect(),
        });

        let mut items: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
        if self.fail_stream {
            items.push(Err(AppError::LLM("Mock stream failure".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }
}

// ============= LLM =============

/// Mock LLM client returning a fixed response.
#[derive(Clone)]
pub struct MockLLMClient {
    response: String,
    should_fail: bool,
}

impl MockLLMClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            should_fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            response: String::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate_with_system(&self, _system: &str, _prompt: &str) -> Result<String> {
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        Ok(self.response.clone())
    }

    async fn stream_with_system(&self, _system: &str, _prompt: &str) -> Result<TokenStream> {
        if self.should_fail {
            return Err(AppError::LLM("Mock LLM failure".to_string()));
        }
        let words: Vec<Result<String>> = self
            .response
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(stream::iter(words).boxed())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

// ============= Wiring =============

/// Orchestrator over the given mocks with default settings
pub fn orchestrator(
    search: Arc<CountingSearch>,
    crawler: Arc<LatencyCrawler>,
    summarizer: Arc<CountingSummarizer>,
) -> SearchOrchestrator {
    SearchOrchestrator::new(search, crawler, summarizer)
}

/// Handles to every mock behind an [`AgentLoop`]
pub struct Harness {
    pub decider: Arc<ScriptedDecider>,
    pub search: Arc<CountingSearch>,
    pub crawler: Arc<LatencyCrawler>,
    pub summarizer: Arc<CountingSummarizer>,
    pub answerer: Arc<RecordingAnswerer>,
}

impl Harness {
    pub fn new(decider: ScriptedDecider) -> Self {
        Self {
            decider: Arc::new(decider),
            search: Arc::new(CountingSearch::with_hits(3)),
            crawler: Arc::new(LatencyCrawler::new()),
            summarizer: Arc::new(CountingSummarizer::new()),
            answerer: Arc::new(RecordingAnswerer::new(&["The ", "answer."])),
        }
    }

    pub fn agent(&self) -> AgentLoop {
        AgentLoop::new(
            self.decider.clone(),
            orchestrator(
                self.search.clone(),
                self.crawler.clone(),
                self.summarizer.clone(),
            ),
            self.answerer.clone(),
        )
    }
}

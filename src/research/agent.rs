use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::{Stream, StreamExt};
use tracing::Instrument;

use super::answer::LlmAnswerGenerator;
use super::capabilities::{with_deadline, ActionDecider, AnswerGenerator, Summarizer};
use super::context::ResearchContext;
use super::decide::LlmActionDecider;
use super::events::AnnotationSink;
use super::orchestrator::SearchOrchestrator;
use super::summarize::LlmSummarizer;
use super::trace::RunTrace;
use crate::cache::{CacheStore, Cached};
use crate::llm::{LLMClient, LLMClientFactory, TokenStream};
use crate::tools::web::{DaedraCrawler, DaedraSearch};
use crate::types::{Action, Annotation, AppError, Message, Result, SourceRef};
use crate::utils::toml_config::{DeepSearchConfig, DEFAULT_STEP_BUDGET};

/// Receives the full conversation (input history plus the generated answer)
/// once the answer stream is exhausted.
pub type OnFinish = Box<dyn FnOnce(Vec<Message>) + Send>;

/// Per-run options for [`AgentLoop::run`]
#[derive(Default)]
pub struct RunOptions {
    /// Where progress annotations are sent
    pub annotations: AnnotationSink,
    /// Called with the full conversation once the answer stream completes
    pub on_finish: Option<OnFinish>,
    /// Tracing context for the run; a fresh one is created when absent
    pub trace: Option<RunTrace>,
}

impl RunOptions {
    /// Options with no listener, no callback and a fresh trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Send progress annotations to `sink`
    pub fn with_annotations(mut self, sink: AnnotationSink) -> Self {
        self.annotations = sink;
        self
    }

    /// Receive the updated conversation when the answer completes
    pub fn on_finish(mut self, callback: impl FnOnce(Vec<Message>) + Send + 'static) -> Self {
        self.on_finish = Some(Box::new(callback));
        self
    }

    /// Run under an existing trace
    pub fn with_trace(mut self, trace: RunTrace) -> Self {
        self.trace = Some(trace);
        self
    }
}

/// The streamed final answer of a research run.
///
/// Yields answer text as it is generated. When the underlying stream ends
/// cleanly, the run's `on_finish` callback receives the updated conversation
/// and the run's trace is finalized. A stream error fails the trace as soon as
/// it is yielded, and dropping the stream early logs the run as abandoned.
pub struct AnswerStream {
    is_final: bool,
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
}

impl AnswerStream {
    fn new(
        tokens: TokenStream,
        is_final: bool,
        history: Vec<Message>,
        annotations: Vec<Annotation>,
        on_finish: Option<OnFinish>,
        trace: RunTrace,
    ) -> Self {
        let mut pending = PendingRun { trace: Some(trace) };
        let inner = async_stream::stream! {
            let mut tokens = tokens;
            let mut text = String::new();
            let mut failed = false;

            while let Some(item) = tokens.next().await {
                match item {
                    Ok(chunk) => {
                        text.push_str(&chunk);
                        yield Ok(chunk);
                    }
                    Err(e) => {
                        // Callers usually stop polling at the first error
                        pending.fail(&e);
                        failed = true;
                        yield Err(e);
                        break;
                    }
                }
            }

            if !failed {
                let mut messages = history;
                let mut reply = Message::assistant(text);
                reply.annotations = annotations;
                messages.push(reply);
                if let Some(callback) = on_finish {
                    callback(messages);
                }
                pending.finish();
            }
        };

        Self {
            is_final,
            inner: Box::pin(inner),
        }
    }

    /// Whether the answer was forced by the step budget
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Drain the stream into a single string
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

/// Holds the run's trace until the answer stream settles
struct PendingRun {
    trace: Option<RunTrace>,
}

impl PendingRun {
    fn finish(&mut self) {
        if let Some(trace) = self.trace.take() {
            trace.finish();
        }
    }

    fn fail(&mut self, error: &AppError) {
        if let Some(trace) = self.trace.take() {
            trace.fail(error);
        }
    }
}

impl Drop for PendingRun {
    fn drop(&mut self) {
        if let Some(trace) = self.trace.take() {
            trace.abandon();
        }
    }
}

impl std::fmt::Debug for AnswerStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerStream")
            .field("is_final", &self.is_final)
            .finish_non_exhaustive()
    }
}

impl Stream for AnswerStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// The research state machine.
///
/// Each cycle asks the decider for the next action. A search is expanded into
/// an evidence batch by the [`SearchOrchestrator`] and appended to the
/// context; an answer ends the loop. Once the step budget is spent the loop
/// stops deciding and forces a final answer, so every successful run ends in
/// exactly one answer-generation call.
pub struct AgentLoop {
    decider: Arc<dyn ActionDecider>,
    orchestrator: SearchOrchestrator,
    answerer: Arc<dyn AnswerGenerator>,
    step_budget: u32,
    call_timeout: Option<Duration>,
}

impl AgentLoop {
    /// Loop over the given capabilities with the default step budget and no deadlines
    pub fn new(
        decider: Arc<dyn ActionDecider>,
        orchestrator: SearchOrchestrator,
        answerer: Arc<dyn AnswerGenerator>,
    ) -> Self {
        Self {
            decider,
            orchestrator,
            answerer,
            step_budget: DEFAULT_STEP_BUDGET,
            call_timeout: None,
        }
    }

    /// Searches allowed before an answer is forced
    pub fn with_step_budget(mut self, step_budget: u32) -> Self {
        self.step_budget = step_budget;
        self
    }

    /// Deadline for decide and answer calls
    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Configured step budget
    pub fn step_budget(&self) -> u32 {
        self.step_budget
    }

    /// Wire the LLM-backed decider, summarizer and answerer and the daedra
    /// search and crawler according to `config`.
    pub async fn from_config(config: &DeepSearchConfig, store: Arc<dyn CacheStore>) -> Result<Self> {
        let factory = LLMClientFactory::from_config(&config.llm)?;
        let llm: Arc<dyn LLMClient> = Arc::from(factory.create_default().await?);
        let summarize_llm: Arc<dyn LLMClient> = Arc::from(factory.create_summarizer().await?);

        let summarizer = LlmSummarizer::new(summarize_llm);
        let summarizer: Arc<Summarizer> = if config.cache.enabled {
            let cached = Cached::wrap("summarizeURL", summarizer, store);
            if config.cache.single_flight {
                Arc::new(cached.with_single_flight())
            } else {
                Arc::new(cached)
            }
        } else {
            Arc::new(summarizer)
        };

        let orchestrator = SearchOrchestrator::new(
            Arc::new(DaedraSearch::new()),
            Arc::new(DaedraCrawler::new(config.crawler.clone())),
            summarizer,
        )
        .with_fan_out(config.research.fan_out)
        .with_call_timeout(config.research.call_timeout())
        .with_search_failure(config.research.search_failure)
        .with_summarize_failure(config.research.summarize_failure);

        Ok(Self::new(
            Arc::new(LlmActionDecider::new(Arc::clone(&llm))),
            orchestrator,
            Arc::new(LlmAnswerGenerator::new(llm)),
        )
        .with_step_budget(config.research.step_budget)
        .with_call_timeout(config.research.call_timeout()))
    }

    /// Research `messages` and stream the answer.
    ///
    /// Fails if a decision fails, a decision is malformed or a search action
    /// carries no query, or (under the abort policies) if search or
    /// summarization fails.
    pub async fn run(&self, messages: Vec<Message>, options: RunOptions) -> Result<AnswerStream> {
        let RunOptions {
            annotations,
            on_finish,
            trace,
        } = options;
        let trace = trace.unwrap_or_default();
        let span = trace.span().clone();

        let mut context = ResearchContext::new(messages, self.step_budget);
        let mut emitted = Vec::new();

        let outcome = async {
            let is_final = self
                .research(&mut context, &annotations, &mut emitted, &trace)
                .await?;
            let tokens = with_deadline(
                self.call_timeout,
                "answer",
                self.answerer.answer(&context, is_final, &trace),
            )
            .await?;
            Ok::<_, AppError>((is_final, tokens))
        }
        .instrument(span)
        .await;

        match outcome {
            Ok((is_final, tokens)) => Ok(AnswerStream::new(
                tokens,
                is_final,
                context.into_messages(),
                emitted,
                on_finish,
                trace,
            )),
            Err(e) => {
                trace.fail(&e);
                Err(e)
            }
        }
    }

    /// Drive decide/search cycles; returns whether the answer is forced.
    async fn research(
        &self,
        context: &mut ResearchContext,
        sink: &AnnotationSink,
        emitted: &mut Vec<Annotation>,
        trace: &RunTrace,
    ) -> Result<bool> {
        while !context.should_stop() {
            trace.record_decision();
            let next = with_deadline(
                self.call_timeout,
                "decide-action",
                self.decider.next_action(context, trace),
            )
            .await?;

            tracing::info!(
                step = context.step() + 1,
                budget = context.step_budget(),
                action = next.action.kind(),
                "Next action chosen"
            );

            let annotation = Annotation::NewAction {
                action: next.clone(),
            };
            sink.emit(annotation.clone());
            emitted.push(annotation);

            match next.action {
                Action::Search { query } => {
                    if query.trim().is_empty() {
                        return Err(AppError::InvalidInput(
                            "Query is required for search action".to_string(),
                        ));
                    }

                    let history = context.message_history();
                    let results = self.orchestrator.gather(&query, &history, trace).await?;

                    let annotation = Annotation::EvidenceBatch {
                        query: query.clone(),
                        sources: results.iter().map(SourceRef::from).collect(),
                    };
                    sink.emit(annotation.clone());
                    emitted.push(annotation);

                    context.report_search(query, results);
                }
                Action::Answer => return Ok(false),
            }

            context.increment_step();
        }

        tracing::info!(
            budget = context.step_budget(),
            "Step budget exhausted, forcing final answer"
        );
        Ok(true)
    }
}

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Counters reported when a run is finalized
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceSummary {
    /// Decide-action calls made
    pub decisions: u32,
    /// Search steps run
    pub searches: u32,
    /// Pages that could not be fetched
    pub failed_crawls: u32,
    /// Pages summarized
    pub summaries: u32,
}

/// Tracing context for one research run.
///
/// Created per run and passed explicitly to everything that logs on the
/// run's behalf. All events are recorded inside [`RunTrace::span`], which
/// carries the run's `trace_id`. [`RunTrace::finish`] closes the run and logs
/// its summary; [`RunTrace::fail`] and [`RunTrace::abandon`] close it otherwise.
#[derive(Debug)]
pub struct RunTrace {
    id: Uuid,
    session_id: Option<String>,
    started: Instant,
    span: tracing::Span,
    decisions: AtomicU32,
    searches: AtomicU32,
    failed_crawls: AtomicU32,
    summaries: AtomicU32,
}

impl RunTrace {
    /// Start a run, optionally tied to a chat session
    pub fn new(session_id: Option<String>) -> Self {
        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "research_run",
            trace_id = %id,
            session_id = session_id.as_deref().unwrap_or("-"),
        );

        Self {
            id,
            session_id,
            started: Instant::now(),
            span,
            decisions: AtomicU32::new(0),
            searches: AtomicU32::new(0),
            failed_crawls: AtomicU32::new(0),
            summaries: AtomicU32::new(0),
        }
    }

    /// Unique id of this run
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Session the run belongs to, if any
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Span every event of the run is recorded in
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Time since the run started
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Count one decide-action call
    pub fn record_decision(&self) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one search step
    pub fn record_search(&self) {
        self.searches.fetch_add(1, Ordering::Relaxed);
    }

    /// Count pages that could not be fetched in a batch
    pub fn record_failed_crawls(&self, count: u32) {
        self.failed_crawls.fetch_add(count, Ordering::Relaxed);
    }

    /// Count pages summarized in a batch
    pub fn record_summaries(&self, count: u32) {
        self.summaries.fetch_add(count, Ordering::Relaxed);
    }

    /// Counters so far
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            decisions: self.decisions.load(Ordering::Relaxed),
            searches: self.searches.load(Ordering::Relaxed),
            failed_crawls: self.failed_crawls.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
        }
    }

    /// Close the run after a successful answer
    pub fn finish(self) -> TraceSummary {
        let summary = self.summary();
        self.span.in_scope(|| {
            tracing::info!(
                decisions = summary.decisions,
                searches = summary.searches,
                failed_crawls = summary.failed_crawls,
                summaries = summary.summaries,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "Research run finished"
            );
        });
        summary
    }

    /// Close the run after a fatal error
    pub fn fail(self, error: &crate::types::AppError) -> TraceSummary {
        let summary = self.summary();
        self.span.in_scope(|| {
            tracing::error!(
                error = %error,
                decisions = summary.decisions,
                searches = summary.searches,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "Research run failed"
            );
        });
        summary
    }

    /// Close a run whose answer was dropped before it completed
    pub fn abandon(self) -> TraceSummary {
        let summary = self.summary();
        self.span.in_scope(|| {
            tracing::warn!(
                decisions = summary.decisions,
                searches = summary.searches,
                elapsed_ms = self.elapsed().as_millis() as u64,
                "Research run abandoned before the answer completed"
            );
        });
        summary
    }
}

impl Default for RunTrace {
    fn default() -> Self {
        Self::new(None)
    }
}

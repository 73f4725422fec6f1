//! An in-memory tracer that records every span it hands out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use opentelemetry::trace::SpanId;

use super::{local_span_context, root_trace_id, Span, SpanContext, TagValue, Tracer};

/// A span as recorded by [`MockTracer`] when it was finished.
#[derive(Debug, Clone, PartialEq)]
pub struct FinishedSpan {
    pub operation: String,
    pub context: SpanContext,
    pub parent: Option<SpanContext>,
    pub tags: Vec<(String, TagValue)>,
    /// How many times `finish` was called on the span.
    pub finish_count: usize,
}

impl FinishedSpan {
    pub fn parent_id(&self) -> Option<SpanId> {
        self.parent.as_ref().map(SpanContext::span_id)
    }

    /// The value of the first tag named `key`.
    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

#[derive(Default)]
struct Recorder {
    next_id: AtomicU64,
    finish_seq: AtomicU64,
    started: Mutex<Vec<Arc<MockSpan>>>,
}

struct MockSpan {
    operation: String,
    context: SpanContext,
    parent: Option<SpanContext>,
    state: Mutex<SpanState>,
}

#[derive(Default)]
struct SpanState {
    tags: Vec<(String, TagValue)>,
    finish_count: usize,
    /// Position in the recorder's finish order, set on first finish.
    finished_at: Option<u64>,
}

/// Records spans for inspection in tests.
///
/// Span and trace ids are assigned sequentially starting at 1. A child span
/// inherits the trace id of its parent.
#[derive(Clone, Default)]
pub struct MockTracer {
    recorder: Arc<Recorder>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockTracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of spans started so far.
    pub fn started_count(&self) -> usize {
        lock(&self.recorder.started).len()
    }

    /// Spans finished at least once, in the order of their first finish.
    pub fn finished_spans(&self) -> Vec<FinishedSpan> {
        let started = lock(&self.recorder.started);
        let mut finished: Vec<(u64, FinishedSpan)> = started
            .iter()
            .filter_map(|span| {
                let state = lock(&span.state);
                state.finished_at.map(|seq| {
                    (
                        seq,
                        FinishedSpan {
                            operation: span.operation.clone(),
                            context: span.context.clone(),
                            parent: span.parent.clone(),
                            tags: state.tags.clone(),
                            finish_count: state.finish_count,
                        },
                    )
                })
            })
            .collect();
        finished.sort_by_key(|(seq, _)| *seq);
        finished.into_iter().map(|(_, span)| span).collect()
    }

    /// Number of started spans that were never finished.
    pub fn unfinished_count(&self) -> usize {
        lock(&self.recorder.started)
            .iter()
            .filter(|span| lock(&span.state).finish_count == 0)
            .count()
    }

    pub fn reset(&self) {
        lock(&self.recorder.started).clear();
    }
}

impl Tracer for MockTracer {
    fn start_span(&self, operation: &str, parent: Option<&SpanContext>) -> Arc<dyn Span> {
        let span_id = self.recorder.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let trace_id = parent
            .map(SpanContext::trace_id)
            .unwrap_or_else(|| root_trace_id(span_id));

        let span = Arc::new(MockSpan {
            operation: operation.to_string(),
            context: local_span_context(trace_id, span_id),
            parent: parent.cloned(),
            state: Mutex::new(SpanState::default()),
        });
        lock(&self.recorder.started).push(span.clone());

        Arc::new(MockHandle {
            span,
            recorder: self.recorder.clone(),
        })
    }
}

struct MockHandle {
    span: Arc<MockSpan>,
    recorder: Arc<Recorder>,
}

impl Span for MockHandle {
    fn context(&self) -> SpanContext {
        self.span.context.clone()
    }

    fn set_tag(&self, key: &str, value: TagValue) {
        lock(&self.span.state).tags.push((key.to_string(), value));
    }

    fn finish(&self) {
        let mut state = lock(&self.span.state);
        state.finish_count += 1;
        if state.finished_at.is_none() {
            state.finished_at = Some(self.recorder.finish_seq.fetch_add(1, Ordering::Relaxed));
        }
    }
}

//! A [`Tracer`] that reports spans through the `tracing` crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use once_cell::sync::Lazy;
use opentelemetry::trace::SpanId;
use tracing::field;

use super::{local_span_context, root_trace_id, Span, SpanContext, TagValue, Tracer};

/// Ids are unique across every `TracingTracer` in the process.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// The `tracing` span behind every live bridged span.
static LIVE_SPANS: Lazy<Mutex<HashMap<SpanId, tracing::Span>>> = Lazy::new(Default::default);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bridges the proxies' spans into `tracing`.
///
/// Every span becomes an `INFO` level `db.query` span with `otel.name` set to
/// the operation and its `trace_id`/`span_id` recorded. `sql.query` is recorded
/// as its own field. All other tags are joined into the `tags` field when the
/// span finishes, together with `elapsed_ms`.
///
/// Parent resolution:
///
/// | Parent | `tracing` parent |
/// |--------|------------------|
/// | a live span from any `TracingTracer` | that span |
/// | any other span context | none; the id goes into `parent_span_id` |
/// | none | the current `tracing` span, if any |
///
/// A `tracing` span cannot take children after it closes, while row spans are
/// started after their query span finished. The underlying `tracing` span
/// therefore stays open until the last handle to it is dropped. The measured
/// duration is the one in `elapsed_ms`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTracer;

impl TracingTracer {
    pub fn new() -> Self {
        Self
    }
}

impl Tracer for TracingTracer {
    fn start_span(&self, operation: &str, parent: Option<&SpanContext>) -> Arc<dyn Span> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let trace_id = parent
            .map(SpanContext::trace_id)
            .unwrap_or_else(|| root_trace_id(id));
        let context = local_span_context(trace_id, id);

        let parent_id = match parent {
            Some(parent) => lock(&LIVE_SPANS)
                .get(&parent.span_id())
                .and_then(tracing::Span::id),
            None => tracing::Span::current().id(),
        };

        let span = tracing::info_span!(
            parent: parent_id,
            "db.query",
            otel.name = %operation,
            trace_id = %trace_id,
            span_id = %context.span_id(),
            parent_span_id = field::Empty,
            sql.query = field::Empty,
            tags = field::Empty,
            elapsed_ms = field::Empty,
        );
        if let Some(parent) = parent {
            span.record("parent_span_id", field::display(parent.span_id()));
        }
        lock(&LIVE_SPANS).insert(context.span_id(), span.clone());

        Arc::new(BridgedSpan {
            context,
            started: Instant::now(),
            state: Mutex::new(BridgeState {
                span,
                tags: Vec::new(),
                finished: false,
            }),
        })
    }
}

struct BridgedSpan {
    context: SpanContext,
    started: Instant,
    state: Mutex<BridgeState>,
}

struct BridgeState {
    span: tracing::Span,
    tags: Vec<(String, TagValue)>,
    finished: bool,
}

impl Span for BridgedSpan {
    fn context(&self) -> SpanContext {
        self.context.clone()
    }

    fn set_tag(&self, key: &str, value: TagValue) {
        let mut state = lock(&self.state);
        if key == "sql.query" {
            state.span.record("sql.query", field::display(&value));
        } else {
            state.tags.push((key.to_string(), value));
        }
    }

    fn finish(&self) {
        let mut state = lock(&self.state);
        if state.finished {
            return;
        }
        state.finished = true;

        let elapsed_ms = self.started.elapsed().as_millis() as i64;
        state.span.record("elapsed_ms", elapsed_ms);
        if !state.tags.is_empty() {
            let tags = state
                .tags
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(" ");
            state.span.record("tags", tags.as_str());
        }
    }
}

impl Drop for BridgedSpan {
    fn drop(&mut self) {
        lock(&LIVE_SPANS).remove(&self.context.span_id());
    }
}

//! The tracer capability the proxies call into.
//!
//! The proxies never create spans on their own. They ask a [`Tracer`] for one,
//! tag it, and finish it through a [`SpanGuard`]. The current span travels
//! explicitly inside a [`Context`].

use std::fmt;
use std::sync::Arc;

use opentelemetry::trace::{SpanId, TraceContextExt, TraceFlags, TraceId, TraceState};
pub use opentelemetry::trace::SpanContext;

use crate::context::Context;
use crate::driver::Value;

mod bridge;
mod mock;

pub use bridge::TracingTracer;
pub use mock::{FinishedSpan, MockTracer};

/// A sampled, local span context from sequential ids.
fn local_span_context(trace_id: TraceId, span_id: u64) -> SpanContext {
    SpanContext::new(
        trace_id,
        SpanId::from_bytes(span_id.to_be_bytes()),
        TraceFlags::SAMPLED,
        false,
        TraceState::default(),
    )
}

fn root_trace_id(seed: u64) -> TraceId {
    TraceId::from_bytes(u128::from(seed).to_be_bytes())
}

/// A tag value attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Null => f.write_str("null"),
            TagValue::Bool(v) => write!(f, "{v}"),
            TagValue::Int(v) => write!(f, "{v}"),
            TagValue::Float(v) => write!(f, "{v}"),
            TagValue::Str(v) => f.write_str(v),
            TagValue::Bytes(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&Value> for TagValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => TagValue::Null,
            Value::Bool(v) => TagValue::Bool(*v),
            Value::Int(v) => TagValue::Int(*v),
            Value::Float(v) => TagValue::Float(*v),
            Value::Text(v) => TagValue::Str(v.clone()),
            Value::Bytes(v) => TagValue::Bytes(v.clone()),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<u64> for TagValue {
    fn from(v: u64) -> Self {
        TagValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

/// Creates spans.
pub trait Tracer: Send + Sync {
    /// Start a span as a child of `parent`, or a root span for `None`.
    fn start_span(&self, operation: &str, parent: Option<&SpanContext>) -> Arc<dyn Span>;
}

/// A timed unit of work owned by the tracer.
pub trait Span: Send + Sync {
    fn context(&self) -> SpanContext;

    fn set_tag(&self, key: &str, value: TagValue);

    /// Mark the span as done. The proxies call this exactly once per span.
    fn finish(&self);
}

/// The active span carried by `ctx`, if any.
///
/// Any valid span context counts, including one put there by other
/// OpenTelemetry instrumentation.
pub fn span_from_context(ctx: &Context) -> Option<SpanContext> {
    if !ctx.has_active_span() {
        return None;
    }
    let span_context = ctx.span().span_context().clone();
    span_context.is_valid().then_some(span_context)
}

/// Derive a context carrying `span` as the active span.
///
/// Only the span's identity travels in the context. Whoever started the span
/// keeps the handle and finishes it.
pub fn context_with_span(ctx: &Context, span: &dyn Span) -> Context {
    ctx.with_remote_span_context(span.context())
}

/// Finishes its span when dropped.
///
/// Dropping happens on every exit path, including `?` returns, unwinding and a
/// cancelled future, so a span started under a guard is always finished once.
#[must_use = "the span finishes as soon as the guard is dropped"]
pub struct SpanGuard {
    span: Arc<dyn Span>,
}

impl SpanGuard {
    pub fn new(span: Arc<dyn Span>) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &Arc<dyn Span> {
        &self.span
    }
}

impl Drop for SpanGuard {
    fn drop(&mut self) {
        self.span.finish();
    }
}

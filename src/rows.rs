//! Result cursor proxy.

use std::sync::Arc;

use crate::config::TracingConfig;
use crate::context::Context;
use crate::driver::{Rows, Value};
use crate::error::Result;
use crate::tracer::{span_from_context, Span, SpanGuard, Tracer};

const ROWS_NEXT_OPERATION: &str = "sql:rows_next";
const ROWS_CLOSE_OPERATION: &str = "sql:rows_close";

/// Traces every row fetched from a cursor and its close.
///
/// The cursor is bound to the context of the query that produced it, so the
/// row spans are children of that query's span. If the bound context carries
/// no span, nothing is traced.
pub struct ProxyRows {
    inner: Box<dyn Rows>,
    ctx: Context,
    /// The finished query span, held so tracers can still nest children under it.
    query_span: Arc<dyn Span>,
    tracer: Arc<dyn Tracer>,
    config: Arc<TracingConfig>,
    fetched: u64,
}

impl ProxyRows {
    pub(crate) fn new(
        inner: Box<dyn Rows>,
        ctx: Context,
        query_span: Arc<dyn Span>,
        tracer: Arc<dyn Tracer>,
        config: Arc<TracingConfig>,
    ) -> Self {
        Self {
            inner,
            ctx,
            query_span,
            tracer,
            config,
            fetched: 0,
        }
    }

    /// The context row spans are parented to.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Start a child span of the bound query span, if there is one.
    fn child_span(&self, operation: &str) -> Option<SpanGuard> {
        let parent = span_from_context(&self.ctx)?;
        let span = self.tracer.start_span(operation, Some(&parent));
        Some(SpanGuard::new(span))
    }
}

impl std::fmt::Debug for ProxyRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRows")
            .field("query_span", &self.query_span.context().span_id())
            .field("fetched", &self.fetched)
            .finish_non_exhaustive()
    }
}

impl Rows for ProxyRows {
    fn columns(&self) -> Vec<String> {
        self.inner.columns()
    }

    fn close(&mut self) -> Result<()> {
        let guard = self.child_span(ROWS_CLOSE_OPERATION);
        if let Some(guard) = &guard {
            if self.config.record_row_counts {
                guard.span().set_tag("sql.rows", self.fetched.into());
            }
        }

        let result = self.inner.close();
        if let (Some(guard), Err(err)) = (&guard, &result) {
            guard.span().set_tag("error", true.into());
            guard.span().set_tag("error.message", err.to_string().into());
        }
        result
    }

    fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        let guard = self.child_span(ROWS_NEXT_OPERATION);

        let result = self.inner.next(dest);
        match (&guard, &result) {
            (_, Ok(true)) => self.fetched += 1,
            (Some(guard), Err(err)) => {
                guard.span().set_tag("error", true.into());
                guard.span().set_tag("error.message", err.to_string().into());
            }
            _ => {}
        }
        result
    }
}

//! Traced connection wrapper.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::config::TracingConfig;
use crate::context::Context;
use crate::driver::{
    Capabilities, Capability, Conn, ExecResult, NamedValue, Rows, Stmt, Tx, TxOptions, Value,
};
use crate::error::{Error, Result};
use crate::parser::QuerySummary;
use crate::rows::ProxyRows;
use crate::statement::ProxyStmt;
use crate::tracer::{context_with_span, span_from_context, Span, SpanContext, SpanGuard, Tracer};

const QUERY_OPERATION: &str = "sql:query";

/// A traced wrapper around one live backend connection.
///
/// The proxy advertises exactly the connection-level capabilities of the
/// wrapped connection, captured when it is wrapped. Calling one of the optional
/// methods directly still behaves sensibly when the backend lacks it:
///
/// | Method | Without the capability |
/// |--------|------------------------|
/// | `prepare_context` | falls back to `prepare` |
/// | `begin_tx` | falls back to `begin` |
/// | `ping` | succeeds without probing |
/// | `exec`, `exec_context`, `query`, `query_context` | [`Error::Skip`] |
///
/// The legacy `begin` is synchronous and always calls the backend's own
/// `begin`, even when the backend advertises `BeginTx`. Use `begin_tx` to reach
/// the context-aware form.
///
/// Only `query_context` is traced, and only when the caller's context already
/// carries a span. In that case a `sql:query` child span brackets the backend
/// call and the returned cursor is a [`ProxyRows`] bound to the derived context,
/// so row spans nest under the query span.
pub struct ProxyConn {
    inner: Box<dyn Conn>,
    tracer: Arc<dyn Tracer>,
    config: Arc<TracingConfig>,
    capabilities: Capabilities,
}

impl ProxyConn {
    pub fn new(inner: Box<dyn Conn>, tracer: Arc<dyn Tracer>, config: Arc<TracingConfig>) -> Self {
        let capabilities = inner.capabilities().intersection(Capabilities::CONNECTION);
        Self {
            inner,
            tracer,
            config,
            capabilities,
        }
    }

    /// Get a reference to the underlying connection.
    pub fn inner(&self) -> &dyn Conn {
        self.inner.as_ref()
    }

    /// Consume the wrapper and return the underlying connection.
    pub fn into_inner(self) -> Box<dyn Conn> {
        self.inner
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities.supports(capability)
    }

    /// Start the query span as a child of `parent` and tag it.
    fn create_span(&self, parent: &SpanContext, query: &str, args: &[NamedValue]) -> Arc<dyn Span> {
        let span = self.tracer.start_span(QUERY_OPERATION, Some(parent));

        if self.config.log_statements {
            span.set_tag("sql.query", query.into());
        }

        if self.config.log_parameters {
            for arg in args {
                let key = match arg.name() {
                    Some(name) => format!("sql.arg.{name}"),
                    None => format!("sql.arg.{}", arg.ordinal),
                };
                span.set_tag(&key, (&arg.value).into());
            }
        }

        if self.config.record_operation {
            let summary = QuerySummary::of(query);
            span.set_tag("sql.operation", summary.kind.as_str().into());
            if let Some(table) = summary.table {
                span.set_tag("sql.table", table.into());
            }
        }

        if let Some(db_name) = &self.config.database_name {
            span.set_tag("db.instance", db_name.as_str().into());
        }

        span
    }

    /// Record the outcome of the backend call on the query span.
    fn record_result<T>(&self, span: &Arc<dyn Span>, result: &Result<T>, start: Instant) {
        let elapsed = start.elapsed();
        if elapsed > self.config.slow_query_threshold {
            span.set_tag("slow_query", true.into());
            tracing::warn!(
                duration_ms = elapsed.as_millis() as u64,
                threshold_ms = self.config.slow_query_threshold.as_millis() as u64,
                "Slow query detected"
            );
        }

        if let Err(e) = result {
            span.set_tag("error", true.into());
            span.set_tag("error.message", e.to_string().into());
            tracing::debug!(error = %e, "Database query failed");
        }
    }
}

impl std::fmt::Debug for ProxyConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyConn")
            .field("capabilities", &self.capabilities)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Conn for ProxyConn {
    fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>> {
        let stmt = self.inner.prepare(query)?;
        Ok(Box::new(ProxyStmt::wrap(stmt, query)))
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn begin(&mut self) -> Result<Box<dyn Tx>> {
        self.inner.begin()
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn prepare_context(&mut self, ctx: &Context, query: &str) -> Result<Box<dyn Stmt>> {
        let stmt = if self.supports(Capability::PrepareContext) {
            self.inner.prepare_context(ctx, query).await?
        } else {
            self.inner.prepare(query)?
        };
        Ok(Box::new(ProxyStmt::wrap(stmt, query)))
    }

    async fn begin_tx(&mut self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>> {
        if self.supports(Capability::BeginTx) {
            self.inner.begin_tx(ctx, opts).await
        } else {
            self.inner.begin()
        }
    }

    async fn ping(&mut self, ctx: &Context) -> Result<()> {
        if self.supports(Capability::Ping) {
            self.inner.ping(ctx).await
        } else {
            Ok(())
        }
    }

    fn exec(&mut self, query: &str, args: &[Value]) -> Result<ExecResult> {
        if !self.supports(Capability::Exec) {
            return Err(Error::Skip);
        }
        self.inner.exec(query, args)
    }

    async fn exec_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<ExecResult> {
        if !self.supports(Capability::ExecContext) {
            return Err(Error::Skip);
        }
        self.inner.exec_context(ctx, query, args).await
    }

    fn query(&mut self, query: &str, args: &[Value]) -> Result<Box<dyn Rows>> {
        if !self.supports(Capability::Query) {
            return Err(Error::Skip);
        }
        self.inner.query(query, args)
    }

    async fn query_context(
        &mut self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        if !self.supports(Capability::QueryContext) {
            return Err(Error::Skip);
        }

        // No caller span means the caller opted out of tracing.
        let Some(parent) = span_from_context(ctx) else {
            return self.inner.query_context(ctx, query, args).await;
        };

        let span = self.create_span(&parent, query, args);
        let guard = SpanGuard::new(span.clone());
        let ctx = context_with_span(ctx, span.as_ref());

        let start = Instant::now();
        let result = self.inner.query_context(&ctx, query, args).await;
        self.record_result(guard.span(), &result, start);

        let rows = result?;
        Ok(Box::new(ProxyRows::new(
            rows,
            ctx,
            span,
            self.tracer.clone(),
            self.config.clone(),
        )))
    }
}

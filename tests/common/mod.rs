//! Backend doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sql_driver_tracing::driver::IsolationLevel;
use sql_driver_tracing::{
    span_from_context, CancellationExt, Capabilities, Capability, Conn, Connector, Context,
    Driver, Error, ExecResult, NamedValue, Result, Rows, SpanContext, Stmt, Tx, TxOptions, Value,
};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{self, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Names of the backend methods that were invoked, in order.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    pub fn record(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|c| *c == name).count()
    }
}

/// Span contexts the backend found in the contexts it was handed.
#[derive(Clone, Default)]
pub struct SeenSpans(Arc<Mutex<Vec<Option<SpanContext>>>>);

impl SeenSpans {
    fn record(&self, ctx: &Context) {
        self.0.lock().unwrap().push(span_from_context(ctx));
    }

    pub fn all(&self) -> Vec<Option<SpanContext>> {
        self.0.lock().unwrap().clone()
    }
}

pub fn backend_error(message: &str) -> Error {
    #[derive(Debug)]
    struct BackendFailure(String);

    impl std::fmt::Display for BackendFailure {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl std::error::Error for BackendFailure {}

    Error::backend(BackendFailure(message.to_string()))
}

/// Whether `a` and `b` are the very same backend error value.
pub fn same_error(a: &Error, b: &Error) -> bool {
    match (a, b) {
        (Error::Backend(a), Error::Backend(b)) => {
            std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
        }
        _ => false,
    }
}

/// Every subset of `set`.
pub fn subsets(set: Capabilities) -> Vec<Capabilities> {
    let members: Vec<Capability> = set.iter().collect();
    (0..1u32 << members.len())
        .map(|mask| {
            members
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, c)| *c)
                .collect::<Capabilities>()
        })
        .collect()
}

pub fn sample_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(1), Value::from("ada")],
        vec![Value::Int(2), Value::from("grace")],
        vec![Value::Int(3), Value::from("edsger")],
    ]
}

pub struct FakeConn {
    pub caps: Capabilities,
    pub stmt_caps: Capabilities,
    pub stmt_error: Option<Error>,
    pub calls: Calls,
    pub seen: SeenSpans,
    pub error: Option<Error>,
    pub latency: Duration,
    pub rows: Vec<Vec<Value>>,
}

impl FakeConn {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            caps,
            stmt_caps: Capabilities::empty(),
            stmt_error: None,
            calls: Calls::default(),
            seen: SeenSpans::default(),
            error: None,
            latency: Duration::ZERO,
            rows: sample_rows(),
        }
    }

    pub fn with_stmt_caps(mut self, caps: Capabilities) -> Self {
        self.stmt_caps = caps;
        self
    }

    /// Statements prepared on this connection fail their context-aware calls.
    pub fn with_failing_stmts(mut self, error: Error) -> Self {
        self.stmt_error = Some(error);
        self
    }

    pub fn failing(mut self, error: Error) -> Self {
        self.error = Some(error);
        self
    }

    /// `query_context` blocks for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn outcome<T>(&self, value: T) -> Result<T> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(value),
        }
    }

    fn rows(&self) -> Box<dyn Rows> {
        Box::new(FakeRows::new(self.rows.clone(), self.calls.clone()))
    }

    fn stmt(&self) -> Box<dyn Stmt> {
        let mut stmt = FakeStmt::new(self.stmt_caps, self.calls.clone());
        stmt.error = self.stmt_error.clone();
        Box::new(stmt)
    }
}

#[async_trait]
impl Conn for FakeConn {
    fn prepare(&mut self, _query: &str) -> Result<Box<dyn Stmt>> {
        self.calls.record("prepare");
        let stmt = self.stmt();
        self.outcome(stmt)
    }

    fn close(&mut self) -> Result<()> {
        self.calls.record("close");
        self.outcome(())
    }

    fn begin(&mut self) -> Result<Box<dyn Tx>> {
        self.calls.record("begin");
        self.outcome(Box::new(FakeTx) as Box<dyn Tx>)
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn prepare_context(&mut self, ctx: &Context, _query: &str) -> Result<Box<dyn Stmt>> {
        self.calls.record("prepare_context");
        self.seen.record(ctx);
        let stmt = self.stmt();
        self.outcome(stmt)
    }

    async fn begin_tx(&mut self, ctx: &Context, opts: TxOptions) -> Result<Box<dyn Tx>> {
        self.calls.record("begin_tx");
        self.seen.record(ctx);
        assert_eq!(opts.isolation, IsolationLevel::Serializable);
        self.outcome(Box::new(FakeTx) as Box<dyn Tx>)
    }

    async fn ping(&mut self, ctx: &Context) -> Result<()> {
        self.calls.record("ping");
        self.seen.record(ctx);
        self.outcome(())
    }

    fn exec(&mut self, _query: &str, _args: &[Value]) -> Result<ExecResult> {
        self.calls.record("exec");
        self.outcome(ExecResult {
            last_insert_id: Some(7),
            rows_affected: 1,
        })
    }

    async fn exec_context(
        &mut self,
        ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<ExecResult> {
        self.calls.record("exec_context");
        self.seen.record(ctx);
        self.outcome(ExecResult {
            last_insert_id: None,
            rows_affected: 2,
        })
    }

    fn query(&mut self, _query: &str, _args: &[Value]) -> Result<Box<dyn Rows>> {
        self.calls.record("query");
        let rows = self.rows();
        self.outcome(rows)
    }

    async fn query_context(
        &mut self,
        ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        self.calls.record("query_context");
        self.seen.record(ctx);
        std::thread::sleep(self.latency);
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }
        let rows = self.rows();
        self.outcome(rows)
    }
}

/// A connection whose context-aware query panics.
pub struct PanickingConn;

#[async_trait]
impl Conn for PanickingConn {
    fn prepare(&mut self, _query: &str) -> Result<Box<dyn Stmt>> {
        Err(Error::BadConnection)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin(&mut self) -> Result<Box<dyn Tx>> {
        Err(Error::BadConnection)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty().with(Capability::QueryContext)
    }

    async fn query_context(
        &mut self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        panic!("backend crashed mid-query");
    }
}

pub struct FakeStmt {
    pub caps: Capabilities,
    pub calls: Calls,
    pub error: Option<Error>,
}

impl FakeStmt {
    pub fn new(caps: Capabilities, calls: Calls) -> Self {
        Self {
            caps,
            calls,
            error: None,
        }
    }
}

#[async_trait]
impl Stmt for FakeStmt {
    fn close(&mut self) -> Result<()> {
        self.calls.record("stmt.close");
        Ok(())
    }

    fn num_input(&self) -> Option<usize> {
        Some(2)
    }

    fn exec(&mut self, _args: &[Value]) -> Result<ExecResult> {
        self.calls.record("stmt.exec");
        Ok(ExecResult {
            last_insert_id: None,
            rows_affected: 3,
        })
    }

    fn query(&mut self, _args: &[Value]) -> Result<Box<dyn Rows>> {
        self.calls.record("stmt.query");
        Ok(Box::new(FakeRows::new(sample_rows(), self.calls.clone())))
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    async fn exec_context(&mut self, _ctx: &Context, _args: &[NamedValue]) -> Result<ExecResult> {
        self.calls.record("stmt.exec_context");
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(ExecResult {
            last_insert_id: None,
            rows_affected: 4,
        })
    }

    async fn query_context(
        &mut self,
        _ctx: &Context,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        self.calls.record("stmt.query_context");
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(Box::new(FakeRows::new(sample_rows(), self.calls.clone())))
    }

    fn convert_value(&self, column: usize, value: Value) -> Result<Value> {
        self.calls.record("stmt.convert_value");
        Ok(Value::Text(format!("{column}:{value}")))
    }

    fn check_named_value(&self, arg: &mut NamedValue) -> Result<()> {
        self.calls.record("stmt.check_named_value");
        if arg.value == Value::Null {
            return Err(Error::RemoveArgument);
        }
        Ok(())
    }
}

pub struct FakeRows {
    rows: VecDeque<Vec<Value>>,
    calls: Calls,
    pub next_error: Option<Error>,
}

impl FakeRows {
    pub fn new(rows: Vec<Vec<Value>>, calls: Calls) -> Self {
        Self {
            rows: rows.into(),
            calls,
            next_error: None,
        }
    }
}

impl Rows for FakeRows {
    fn columns(&self) -> Vec<String> {
        self.calls.record("rows.columns");
        vec!["id".to_string(), "name".to_string()]
    }

    fn close(&mut self) -> Result<()> {
        self.calls.record("rows.close");
        Ok(())
    }

    fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        self.calls.record("rows.next");
        if let Some(err) = &self.next_error {
            return Err(err.clone());
        }
        match self.rows.pop_front() {
            Some(row) => {
                for (slot, value) in dest.iter_mut().zip(row) {
                    *slot = value;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct FakeTx;

impl Tx for FakeTx {
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A connection whose cursor fails on the first `next`.
pub struct BrokenCursorConn {
    pub error: Error,
}

#[async_trait]
impl Conn for BrokenCursorConn {
    fn prepare(&mut self, _query: &str) -> Result<Box<dyn Stmt>> {
        Err(Error::BadConnection)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn begin(&mut self) -> Result<Box<dyn Tx>> {
        Err(Error::BadConnection)
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::empty().with(Capability::QueryContext)
    }

    async fn query_context(
        &mut self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        let mut rows = FakeRows::new(sample_rows(), Calls::default());
        rows.next_error = Some(self.error.clone());
        Ok(Box::new(rows))
    }
}

pub struct FakeDriver {
    pub caps: Capabilities,
}

impl Driver for FakeDriver {
    fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        if name == "unreachable" {
            return Err(Error::BadConnection);
        }
        Ok(Box::new(FakeConn::new(self.caps)))
    }
}

pub struct FakeConnector {
    pub driver: Arc<FakeDriver>,
    pub error: Option<Error>,
    pub connects: Calls,
}

impl FakeConnector {
    pub fn new(caps: Capabilities) -> Self {
        Self {
            driver: Arc::new(FakeDriver { caps }),
            error: None,
            connects: Calls::default(),
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _ctx: &Context) -> Result<Box<dyn Conn>> {
        self.connects.record("connect");
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.driver.open("fake")
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}

/// Records the `tracing` spans and warnings seen by a subscriber.
///
/// Spans are named by their `otel.name` field when they have one, so bridged
/// spans show up under their operation.
#[derive(Clone, Default)]
pub struct SpanLog {
    spans: Arc<Mutex<Vec<(String, Option<String>)>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
struct SpanName(String);

impl Visit for SpanName {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "otel.name" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "otel.name" {
            self.0 = format!("{value:?}");
        }
    }
}

struct Message(String);

impl Visit for Message {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl SpanLog {
    /// `(name, parent name)` for every span, in creation order.
    pub fn spans(&self) -> Vec<(String, Option<String>)> {
        self.spans.lock().unwrap().clone()
    }

    pub fn parent_of(&self, name: &str) -> Option<String> {
        self.spans()
            .into_iter()
            .find(|(span, _)| span == name)
            .and_then(|(_, parent)| parent)
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl<S> Layer<S> for SpanLog
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: layer::Context<'_, S>) {
        let mut name = SpanName(attrs.metadata().name().to_string());
        attrs.record(&mut name);

        let Some(span) = ctx.span(id) else {
            return;
        };
        let parent = span
            .parent()
            .and_then(|parent| parent.extensions().get::<SpanName>().map(|n| n.0.clone()));
        span.extensions_mut().insert(name.clone());
        self.spans.lock().unwrap().push((name.0, parent));
    }

    fn on_event(&self, event: &Event<'_>, _ctx: layer::Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            let mut message = Message(String::new());
            event.record(&mut message);
            self.warnings.lock().unwrap().push(message.0);
        }
    }
}

//! The pluggable backend contract.
//!
//! A backend implements the base methods of [`Conn`], [`Stmt`] and [`Rows`] and
//! may additionally implement any of the optional [`Capability`] methods. Since
//! trait objects cannot be probed structurally, every backend object advertises
//! what it implements through `capabilities()`. Optional methods it does not
//! advertise keep their default body, which fails with [`Error::Unsupported`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::error::{Error, Result};

/// A value passed to or read from a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Parameter name, if the placeholder was named.
    pub name: Option<String>,
    /// 1-based position of the parameter, always set.
    pub ordinal: usize,
    pub value: Value,
}

impl NamedValue {
    pub fn positional(ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: None,
            ordinal,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, ordinal: usize, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value: value.into(),
        }
    }

    /// The name if the parameter has a non-empty one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Outcome of a write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub last_insert_id: Option<i64>,
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Options for [`Conn::begin_tx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

/// The optional method sets a backend object may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PrepareContext,
    BeginTx,
    Ping,
    Exec,
    ExecContext,
    Query,
    QueryContext,
    StmtExecContext,
    StmtQueryContext,
    ColumnConverter,
    NamedValueChecker,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::PrepareContext,
        Capability::BeginTx,
        Capability::Ping,
        Capability::Exec,
        Capability::ExecContext,
        Capability::Query,
        Capability::QueryContext,
        Capability::StmtExecContext,
        Capability::StmtQueryContext,
        Capability::ColumnConverter,
        Capability::NamedValueChecker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::PrepareContext => "PrepareContext",
            Capability::BeginTx => "BeginTx",
            Capability::Ping => "Ping",
            Capability::Exec => "Exec",
            Capability::ExecContext => "ExecContext",
            Capability::Query => "Query",
            Capability::QueryContext => "QueryContext",
            Capability::StmtExecContext => "StmtExecContext",
            Capability::StmtQueryContext => "StmtQueryContext",
            Capability::ColumnConverter => "ColumnConverter",
            Capability::NamedValueChecker => "NamedValueChecker",
        }
    }

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`Capability`] values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u16);

impl Capabilities {
    /// Capabilities that only make sense on a connection.
    pub const CONNECTION: Capabilities = Capabilities::empty()
        .with(Capability::PrepareContext)
        .with(Capability::BeginTx)
        .with(Capability::Ping)
        .with(Capability::Exec)
        .with(Capability::ExecContext)
        .with(Capability::Query)
        .with(Capability::QueryContext);

    /// Capabilities that only make sense on a prepared statement.
    pub const STATEMENT: Capabilities = Capabilities::empty()
        .with(Capability::StmtExecContext)
        .with(Capability::StmtQueryContext)
        .with(Capability::ColumnConverter)
        .with(Capability::NamedValueChecker);

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    /// The capability probe.
    pub const fn supports(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    #[must_use]
    pub const fn intersection(self, other: Capabilities) -> Self {
        Capabilities(self.0 & other.0)
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL
            .into_iter()
            .filter(move |capability| self.supports(*capability))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Capabilities::empty(), Capabilities::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// A driver that opens connections from a data source name.
pub trait Driver: Send + Sync {
    fn open(&self, name: &str) -> Result<Box<dyn Conn>>;
}

/// A configured source of connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ctx: &Context) -> Result<Box<dyn Conn>>;

    /// The driver behind this connector.
    fn driver(&self) -> Arc<dyn Driver>;
}

/// A live backend connection.
///
/// `prepare`, `close` and `begin` are mandatory. Everything else is optional
/// and must be advertised through [`Conn::capabilities`].
#[async_trait]
pub trait Conn: Send {
    fn prepare(&mut self, query: &str) -> Result<Box<dyn Stmt>>;

    fn close(&mut self) -> Result<()>;

    fn begin(&mut self) -> Result<Box<dyn Tx>>;

    /// Optional capabilities this connection implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    async fn prepare_context(&mut self, _ctx: &Context, _query: &str) -> Result<Box<dyn Stmt>> {
        Err(Error::Unsupported(Capability::PrepareContext))
    }

    async fn begin_tx(&mut self, _ctx: &Context, _opts: TxOptions) -> Result<Box<dyn Tx>> {
        Err(Error::Unsupported(Capability::BeginTx))
    }

    async fn ping(&mut self, _ctx: &Context) -> Result<()> {
        Err(Error::Unsupported(Capability::Ping))
    }

    fn exec(&mut self, _query: &str, _args: &[Value]) -> Result<ExecResult> {
        Err(Error::Unsupported(Capability::Exec))
    }

    async fn exec_context(
        &mut self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<ExecResult> {
        Err(Error::Unsupported(Capability::ExecContext))
    }

    fn query(&mut self, _query: &str, _args: &[Value]) -> Result<Box<dyn Rows>> {
        Err(Error::Unsupported(Capability::Query))
    }

    async fn query_context(
        &mut self,
        _ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        Err(Error::Unsupported(Capability::QueryContext))
    }
}

/// A prepared statement bound to a connection.
#[async_trait]
pub trait Stmt: Send {
    fn close(&mut self) -> Result<()>;

    /// Number of placeholders, or `None` if the backend cannot tell.
    fn num_input(&self) -> Option<usize>;

    fn exec(&mut self, args: &[Value]) -> Result<ExecResult>;

    fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>>;

    /// Optional capabilities this statement implements.
    fn capabilities(&self) -> Capabilities {
        Capabilities::empty()
    }

    async fn exec_context(&mut self, _ctx: &Context, _args: &[NamedValue]) -> Result<ExecResult> {
        Err(Error::Unsupported(Capability::StmtExecContext))
    }

    async fn query_context(
        &mut self,
        _ctx: &Context,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        Err(Error::Unsupported(Capability::StmtQueryContext))
    }

    /// Convert an argument for the placeholder at `column` (0-based).
    fn convert_value(&self, _column: usize, _value: Value) -> Result<Value> {
        Err(Error::Unsupported(Capability::ColumnConverter))
    }

    /// Validate or rewrite an argument before it is bound.
    fn check_named_value(&self, _arg: &mut NamedValue) -> Result<()> {
        Err(Error::Unsupported(Capability::NamedValueChecker))
    }
}

/// A result cursor.
pub trait Rows: Send {
    fn columns(&self) -> Vec<String>;

    fn close(&mut self) -> Result<()>;

    /// Fill `dest` with the next row. Returns `Ok(false)` once the data is exhausted.
    fn next(&mut self, dest: &mut [Value]) -> Result<bool>;
}

/// An open transaction.
pub trait Tx: Send {
    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;
}

impl fmt::Debug for dyn Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stmt")
            .field("num_input", &self.num_input())
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows").finish_non_exhaustive()
    }
}

impl fmt::Debug for dyn Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx").finish_non_exhaustive()
    }
}

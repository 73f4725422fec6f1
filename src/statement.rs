//! Prepared statement proxy.

use async_trait::async_trait;

use crate::context::Context;
use crate::driver::{Capabilities, Capability, ExecResult, NamedValue, Rows, Stmt, Value};
use crate::error::{Error, Result};

/// Forwards every call to a prepared statement.
///
/// The statement-level capabilities of the wrapped statement are captured once
/// in [`ProxyStmt::wrap`] and never change afterwards. The proxy advertises
/// exactly that set, one of the sixteen possible combinations, and rejects
/// optional calls outside of it with [`Error::Unsupported`]. No spans are
/// started here: queries are traced where they start on the connection and
/// where their rows are read.
pub struct ProxyStmt {
    inner: Box<dyn Stmt>,
    query: String,
    capabilities: Capabilities,
}

impl ProxyStmt {
    pub fn wrap(inner: Box<dyn Stmt>, query: impl Into<String>) -> Self {
        let capabilities = inner.capabilities().intersection(Capabilities::STATEMENT);
        Self {
            inner,
            query: query.into(),
            capabilities,
        }
    }

    /// The SQL text this statement was prepared from.
    pub fn query_text(&self) -> &str {
        &self.query
    }

    fn require(&self, capability: Capability) -> Result<()> {
        if self.capabilities.supports(capability) {
            Ok(())
        } else {
            Err(Error::Unsupported(capability))
        }
    }
}

impl std::fmt::Debug for ProxyStmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyStmt")
            .field("query", &self.query)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Stmt for ProxyStmt {
    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn num_input(&self) -> Option<usize> {
        self.inner.num_input()
    }

    fn exec(&mut self, args: &[Value]) -> Result<ExecResult> {
        self.inner.exec(args)
    }

    fn query(&mut self, args: &[Value]) -> Result<Box<dyn Rows>> {
        self.inner.query(args)
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn exec_context(&mut self, ctx: &Context, args: &[NamedValue]) -> Result<ExecResult> {
        self.require(Capability::StmtExecContext)?;
        self.inner.exec_context(ctx, args).await
    }

    async fn query_context(&mut self, ctx: &Context, args: &[NamedValue]) -> Result<Box<dyn Rows>> {
        self.require(Capability::StmtQueryContext)?;
        self.inner.query_context(ctx, args).await
    }

    fn convert_value(&self, column: usize, value: Value) -> Result<Value> {
        self.require(Capability::ColumnConverter)?;
        self.inner.convert_value(column, value)
    }

    fn check_named_value(&self, arg: &mut NamedValue) -> Result<()> {
        self.require(Capability::NamedValueChecker)?;
        self.inner.check_named_value(arg)
    }
}

//! # sql-driver-tracing
//!
//! A capability-preserving tracing proxy for pluggable SQL drivers.
//!
//! The proxy sits between an application and a backend implementing the
//! [`driver`] contract. Every call is forwarded unchanged, results and errors
//! included. What the proxy adds is tracing: spans around context-aware
//! queries and around each row read from their cursors.
//!
//! ## Capability fidelity
//!
//! Backends implement a base contract plus any subset of optional
//! [`Capability`] method sets, advertised through `capabilities()`. Callers
//! probe for a capability before using it, so a proxy must advertise exactly
//! what the wrapped object does. Connection and statement proxies capture the
//! wrapped object's capabilities once, when they are created, and expose that
//! set for their whole lifetime.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sql_driver_tracing::prelude::*;
//!
//! let tracer = Arc::new(TracingTracer::new());
//! let connector = my_connector.with_tracing(tracer.clone());
//!
//! // spans are only recorded below a span the caller already carries
//! let request = tracer.start_span("GET /users", None);
//! let ctx = context_with_span(&Context::new(), request.as_ref());
//!
//! let mut conn = connector.connect(&ctx).await?;
//! let mut rows = conn.query_context(&ctx, "SELECT * FROM users", &[]).await?;
//! ```
//!
//! ## Span Tags
//!
//! | Span | Tag | Description |
//! |------|-----|-------------|
//! | `sql:query` | `sql.query` | Literal SQL text |
//! | `sql:query` | `sql.arg.<name>` / `sql.arg.<ordinal>` | One tag per bound argument |
//! | `sql:query` | `sql.operation`, `sql.table` | Statement kind and table (opt-in) |
//! | `sql:query` | `db.instance` | Configured database name |
//! | `sql:rows_close` | `sql.rows` | Rows fetched through the cursor |
//! | any | `error`, `error.message` | Set when the backend call failed |

mod config;
mod connection;
mod connector;
mod context;
pub mod driver;
mod error;
mod parser;
mod rows;
mod statement;
pub mod tracer;

pub use config::TracingConfig;
pub use connection::ProxyConn;
pub use connector::{wrap_connector, wrap_driver, ProxyConnector, ProxyDriver, TracingExt};
pub use context::{CancellationExt, Context};
pub use driver::{
    Capabilities, Capability, Conn, Connector, Driver, ExecResult, NamedValue, Rows, Stmt, Tx,
    TxOptions, Value,
};
pub use error::{Error, Result};
pub use parser::{QuerySummary, StatementKind};
pub use rows::ProxyRows;
pub use statement::ProxyStmt;
pub use tracer::{
    context_with_span, span_from_context, FinishedSpan, MockTracer, Span, SpanContext, SpanGuard,
    TagValue, Tracer, TracingTracer,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::driver::{Conn, Connector, Driver, Rows, Stmt};
    pub use crate::tracer::{context_with_span, span_from_context, Span, Tracer};
    pub use crate::{CancellationExt, Context, MockTracer, TracingConfig, TracingExt, TracingTracer};
}

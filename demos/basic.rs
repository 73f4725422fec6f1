//! Basic example showing how to use sql-driver-tracing.
//!
//! Run with: cargo run --example basic

use std::sync::Arc;

use async_trait::async_trait;
use sql_driver_tracing::prelude::*;
use sql_driver_tracing::{Capabilities, Capability, Error, NamedValue, Result, Tx, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A toy backend that only answers queries, always with the same two rows.
struct MemoryDriver;

impl Driver for MemoryDriver {
    fn open(&self, _name: &str) -> Result<Box<dyn Conn>> {
        Ok(Box::new(MemoryConn))
    }
}

struct MemoryConnector {
    driver: Arc<MemoryDriver>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _ctx: &Context) -> Result<Box<dyn Conn>> {
        self.driver.open("memory")
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}

struct MemoryConn;

#[async_trait]
impl Conn for MemoryConn {
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
        Capabilities::empty()
            .with(Capability::QueryContext)
            .with(Capability::Ping)
    }

    async fn ping(&mut self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    async fn query_context(
        &mut self,
        ctx: &Context,
        _query: &str,
        _args: &[NamedValue],
    ) -> Result<Box<dyn Rows>> {
        if ctx.is_cancelled() {
            return Err(Error::Canceled);
        }
        Ok(Box::new(MemoryRows {
            remaining: vec![
                vec![Value::Int(1), Value::from("ada")],
                vec![Value::Int(2), Value::from("grace")],
            ],
        }))
    }
}

struct MemoryRows {
    remaining: Vec<Vec<Value>>,
}

impl Rows for MemoryRows {
    fn columns(&self) -> Vec<String> {
        vec!["id".into(), "name".into()]
    }

    fn close(&mut self) -> Result<()> {
        self.remaining.clear();
        Ok(())
    }

    fn next(&mut self, dest: &mut [Value]) -> Result<bool> {
        if self.remaining.is_empty() {
            return Ok(false);
        }
        for (slot, value) in dest.iter_mut().zip(self.remaining.remove(0)) {
            *slot = value;
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,sql_driver_tracing=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tracer = Arc::new(TracingTracer::new());

    // Option 1: Simple wrapping with defaults
    let connector = MemoryConnector {
        driver: Arc::new(MemoryDriver),
    }
    .with_tracing(tracer.clone());

    // Option 2: With custom configuration
    // let connector = MemoryConnector { driver: Arc::new(MemoryDriver) }.with_tracing_config(
    //     tracer.clone(),
    //     TracingConfig::default()
    //         .with_parameter_logging(false)
    //         .with_slow_query_threshold(Duration::from_millis(100)),
    // );

    // Queries are only traced below a span the caller already carries.
    let request = tracer.start_span("GET /users", None);
    let ctx = context_with_span(&Context::new(), request.as_ref());

    let mut conn = connector.connect(&ctx).await?;
    conn.ping(&ctx).await?;

    let mut rows = conn
        .query_context(
            &ctx,
            "SELECT id, name FROM users WHERE id > ?",
            &[NamedValue::positional(1, 0i64)],
        )
        .await?;

    let mut dest = vec![Value::Null; rows.columns().len()];
    while rows.next(&mut dest)? {
        tracing::info!(id = %dest[0], name = %dest[1], "Fetched row");
    }
    rows.close()?;
    drop(rows);

    conn.close()?;
    request.finish();

    Ok(())
}

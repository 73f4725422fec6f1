//! Entry points that hand out traced connections.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TracingConfig;
use crate::connection::ProxyConn;
use crate::context::Context;
use crate::driver::{Conn, Connector, Driver};
use crate::error::Result;
use crate::tracer::Tracer;

/// Wraps a [`Connector`] so every connection it produces is traced.
///
/// Connection establishment itself is not traced, and a failed connect
/// returns the backend's error untouched.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use sql_driver_tracing::{wrap_connector, Context, Connector, TracingTracer};
///
/// let connector = wrap_connector(Arc::new(my_connector), Arc::new(TracingTracer::new()));
/// let mut conn = connector.connect(&Context::new()).await?;
/// ```
pub struct ProxyConnector {
    connector: Arc<dyn Connector>,
    driver: Arc<dyn Driver>,
    tracer: Arc<dyn Tracer>,
    config: Arc<TracingConfig>,
}

/// Wrap a connector with the default configuration.
pub fn wrap_connector(connector: Arc<dyn Connector>, tracer: Arc<dyn Tracer>) -> ProxyConnector {
    ProxyConnector::new(connector, tracer, TracingConfig::default())
}

impl ProxyConnector {
    pub fn new(
        connector: Arc<dyn Connector>,
        tracer: Arc<dyn Tracer>,
        config: TracingConfig,
    ) -> Self {
        Self {
            driver: connector.driver(),
            connector,
            tracer,
            config: Arc::new(config),
        }
    }

    /// The driver behind the wrapped connector, for callers that need the real backend.
    pub fn inner_driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }

    pub fn config(&self) -> &TracingConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for ProxyConnector {
    async fn connect(&self, ctx: &Context) -> Result<Box<dyn Conn>> {
        let conn = self.connector.connect(ctx).await?;
        tracing::debug!(capabilities = ?conn.capabilities(), "Wrapping backend connection");
        Ok(Box::new(ProxyConn::new(
            conn,
            self.tracer.clone(),
            self.config.clone(),
        )))
    }

    fn driver(&self) -> Arc<dyn Driver> {
        self.inner_driver()
    }
}

/// Wraps a bare [`Driver`] so every connection it opens is traced.
pub struct ProxyDriver {
    driver: Arc<dyn Driver>,
    tracer: Arc<dyn Tracer>,
    config: Arc<TracingConfig>,
}

/// Wrap a driver with the default configuration.
pub fn wrap_driver(driver: Arc<dyn Driver>, tracer: Arc<dyn Tracer>) -> ProxyDriver {
    ProxyDriver::new(driver, tracer, TracingConfig::default())
}

impl ProxyDriver {
    pub fn new(driver: Arc<dyn Driver>, tracer: Arc<dyn Tracer>, config: TracingConfig) -> Self {
        Self {
            driver,
            tracer,
            config: Arc::new(config),
        }
    }

    pub fn inner_driver(&self) -> Arc<dyn Driver> {
        self.driver.clone()
    }
}

impl Driver for ProxyDriver {
    fn open(&self, name: &str) -> Result<Box<dyn Conn>> {
        let conn = self.driver.open(name)?;
        tracing::debug!(capabilities = ?conn.capabilities(), "Wrapping backend connection");
        Ok(Box::new(ProxyConn::new(
            conn,
            self.tracer.clone(),
            self.config.clone(),
        )))
    }
}

/// Extension trait for easy wrapping of connectors.
pub trait TracingExt {
    /// Wrap this connector with tracing instrumentation.
    fn with_tracing(self, tracer: Arc<dyn Tracer>) -> ProxyConnector;

    /// Wrap this connector with custom tracing configuration.
    fn with_tracing_config(self, tracer: Arc<dyn Tracer>, config: TracingConfig) -> ProxyConnector;
}

impl<C> TracingExt for C
where
    C: Connector + 'static,
{
    fn with_tracing(self, tracer: Arc<dyn Tracer>) -> ProxyConnector {
        wrap_connector(Arc::new(self), tracer)
    }

    fn with_tracing_config(self, tracer: Arc<dyn Tracer>, config: TracingConfig) -> ProxyConnector {
        ProxyConnector::new(Arc::new(self), tracer, config)
    }
}

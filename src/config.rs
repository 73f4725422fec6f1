//! Configuration for tracing behavior.

use std::time::Duration;

/// Configuration options for the tracing proxies.
///
/// # Example
///
/// ```rust
/// use sql_driver_tracing::TracingConfig;
/// use std::time::Duration;
///
/// let config = TracingConfig::default()
///     .with_parameter_logging(false)
///     .with_slow_query_threshold(Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether to tag query spans with the literal SQL text (`sql.query`).
    /// Default: `true`
    pub log_statements: bool,

    /// Whether to tag query spans with every bound argument (`sql.arg.<name|ordinal>`).
    /// Default: `true`
    pub log_parameters: bool,

    /// Whether to tag query spans with the statement kind and primary table
    /// (`sql.operation`, `sql.table`).
    /// Default: `false`
    pub record_operation: bool,

    /// Whether to tag the cursor close span with the number of rows fetched (`sql.rows`).
    /// Default: `true`
    pub record_row_counts: bool,

    /// Queries whose backend call exceeds this duration are logged at WARN level.
    /// Default: 500ms
    pub slow_query_threshold: Duration,

    /// Database name tagged on query spans as `db.instance`.
    /// Default: `None`
    pub database_name: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_statements: true,
            log_parameters: true,
            record_operation: false,
            record_row_counts: true,
            slow_query_threshold: Duration::from_millis(500),
            database_name: None,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the `sql.query` tag.
    pub fn with_statement_logging(mut self, enabled: bool) -> Self {
        self.log_statements = enabled;
        self
    }

    /// Enable or disable the `sql.arg.*` tags.
    ///
    /// **Security Warning**: Query parameters often contain user input and
    /// potentially sensitive data.
    pub fn with_parameter_logging(mut self, enabled: bool) -> Self {
        self.log_parameters = enabled;
        self
    }

    /// Enable or disable the `sql.operation` and `sql.table` tags.
    pub fn with_operation_tags(mut self, enabled: bool) -> Self {
        self.record_operation = enabled;
        self
    }

    /// Enable or disable row count recording on cursor close.
    pub fn with_row_count_recording(mut self, enabled: bool) -> Self {
        self.record_row_counts = enabled;
        self
    }

    /// Set the threshold for slow query warnings.
    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = threshold;
        self
    }

    /// Set a database name to include in query spans.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Everything on, with a tight slow query threshold.
    pub fn development() -> Self {
        Self {
            log_statements: true,
            log_parameters: true,
            record_operation: true,
            record_row_counts: true,
            slow_query_threshold: Duration::from_millis(100),
            database_name: None,
        }
    }

    /// Keeps the SQL text but never the bound arguments.
    pub fn production() -> Self {
        Self {
            log_statements: true,
            log_parameters: false,
            record_operation: false,
            record_row_counts: true,
            slow_query_threshold: Duration::from_secs(1),
            database_name: None,
        }
    }
}

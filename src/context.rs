//! Request-scoped context threaded through every backend call.
//!
//! The context is [`opentelemetry::Context`]: immutable, cheap to clone, keyed
//! by type. The active span travels in it through
//! [`TraceContextExt`](opentelemetry::trace::TraceContextExt), see
//! [`crate::tracer`]. Cancellation is a stored [`CancellationToken`] that
//! backends observe and the proxies never touch.

pub use opentelemetry::Context;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct Cancellation(CancellationToken);

/// Cancellation accessors for [`Context`].
pub trait CancellationExt {
    /// Derive a context that backends can observe for cancellation.
    fn with_cancellation(&self, token: CancellationToken) -> Self;

    fn cancellation(&self) -> Option<&CancellationToken>;

    fn is_cancelled(&self) -> bool;
}

impl CancellationExt for Context {
    fn with_cancellation(&self, token: CancellationToken) -> Self {
        self.with_value(Cancellation(token))
    }

    fn cancellation(&self) -> Option<&CancellationToken> {
        self.get::<Cancellation>().map(|c| &c.0)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

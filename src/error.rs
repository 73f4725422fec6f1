//! Error values shared by the backend contract and the proxies.

use std::sync::Arc;

use thiserror::Error;

use crate::driver::Capability;

/// Result alias used throughout the driver contract.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by backends and passed through the proxies unchanged.
///
/// The type is `Clone` so a backend failure can travel through every proxy
/// layer as the very same value. [`Error::Backend`] keeps its payload behind an
/// `Arc`, which lets callers check identity with [`Arc::ptr_eq`].
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Decline signal: this layer cannot service the call, try another strategy upstream.
    #[error("driver: skip fast-path; continue as if unimplemented")]
    Skip,

    /// Returned by a named-value checker to drop the argument from the list.
    #[error("driver: remove argument from named value list")]
    RemoveArgument,

    /// The backend connection is unusable and should be discarded.
    #[error("driver: bad connection")]
    BadConnection,

    /// The request context was cancelled before the backend finished.
    #[error("context canceled")]
    Canceled,

    /// An optional method was called on an object that does not advertise it.
    #[error("{0} is not implemented by the wrapped backend")]
    Unsupported(Capability),

    /// Any other failure reported by the backend.
    #[error(transparent)]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Box a backend-specific error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Backend(Arc::new(error))
    }

    /// Whether this is the decline signal.
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Skip)
    }
}

//! Application-level errors

use std::{fmt, sync::Arc};

use domain::DomainError;
use thiserror::Error;

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The backing store could not be reached or timed out
    #[error("Cache store unavailable: {0}")]
    StoreUnavailable(String),

    /// A cached payload could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// The caller-supplied computation failed
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// A destructive admin operation was invoked without confirmation
    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Whether this error originates inside the cache subsystem
    ///
    /// Such errors are logged and treated as a miss, never surfaced to the
    /// caller of a read.
    pub const fn is_cache_internal(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Serialization(_))
    }
}

impl From<serde_json::Error> for ApplicationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A compute failure shared by every caller coalesced onto one computation
///
/// Cloning is cheap and all clones point at the same underlying error, so
/// followers observe exactly what the leader observed.
#[derive(Clone)]
pub struct ComputeError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl ComputeError {
    /// Wrap a compute error
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// Recover the original error type
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    /// Whether two handles refer to the same underlying error
    pub fn same_error(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComputeError").field(&self.0).finish()
    }
}

impl fmt::Display for ComputeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for ComputeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the pool.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// Establishing a session or running a scope failed.
    #[error(transparent)]
    Client(#[from] tedium_client::Error),

    /// No session became available within the acquire timeout.
    #[error("timed out waiting for a session after {0:?}")]
    Timeout(Duration),

    /// The pool is draining and has no session left to serve the caller.
    #[error("pool is draining")]
    Draining,

    /// Invalid pool configuration.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl PoolError {
    /// The underlying client error, if any.
    #[must_use]
    pub fn as_client_error(&self) -> Option<&tedium_client::Error> {
        match self {
            Self::Client(e) => Some(e),
            _ => None,
        }
    }
}

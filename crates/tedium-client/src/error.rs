//! Client error types.

use std::sync::Arc;

use thiserror::Error;

use crate::transaction::TransactionState;

/// Errors raised by sessions, transactions, bulk loads and the session
/// client collaborator.
///
/// `Error` is `Clone` so that a [`Transaction`](crate::Transaction) can keep
/// the error of a failed commit or rollback while also returning it.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum Error {
    /// Establishing or closing a session failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// A statement failed mid-flight. The session's state afterwards is
    /// unknown.
    #[error("request failed: {message}")]
    Request {
        /// Server or client supplied message.
        message: String,
        /// Server error number, when the server reported one.
        number: Option<u32>,
    },

    /// A transaction operation was attempted from a state that forbids it.
    #[error("cannot {operation}: transaction is {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The state the transaction was in.
        state: TransactionState,
    },

    /// Malformed connection string or options.
    #[error("configuration error: {0}")]
    Config(String),

    /// The session has been closed.
    #[error("session {0} is closed")]
    SessionClosed(u64),

    /// An identifier failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// The session client rejected or failed a bulk load.
    #[error("bulk load failed: {0}")]
    BulkLoad(String),

    /// A value could not be converted.
    #[error(transparent)]
    Type(#[from] tedium_types::TypeError),

    /// An error raised by caller code inside a session or transaction scope.
    #[error(transparent)]
    Application(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Create a request error without a server error number.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
            number: None,
        }
    }

    /// Wrap an arbitrary caller error.
    pub fn application(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Application(Arc::new(error))
    }

    /// Whether this error came from statement execution.
    #[must_use]
    pub fn is_request_error(&self) -> bool {
        matches!(self, Self::Request { .. })
    }

    /// Whether this error came from establishing or closing a session.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur when converting between SQL and Rust values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TypeError {
    /// The value has a different type than the one requested.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type.
        expected: &'static str,
        /// What was actually found.
        actual: String,
    },

    /// A NULL was found where a value was required.
    #[error("unexpected NULL value")]
    UnexpectedNull,

    /// The value does not fit in the requested type.
    #[error("value out of range for {target}")]
    OutOfRange {
        /// Target type name.
        target: &'static str,
    },

    /// A type declaration could not be parsed.
    #[error("unknown SQL type: {0}")]
    UnknownSqlType(String),
}

//! Events emitted by the session client while a request runs.
//!
//! The session client decodes the server's token stream into these events;
//! [`collect_result`](crate::result::collect_result) folds them into a
//! [`RequestResult`](crate::RequestResult).

use tedium_types::{DataType, SqlValue};

/// Column definition within a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    /// Column name. May be empty for unnamed expressions.
    pub name: String,
    /// Declared type, when the client reports one.
    pub data_type: Option<DataType>,
    /// Whether the column is nullable.
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Metadata with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
            nullable: true,
        }
    }

    /// Attach a declared type.
    #[must_use]
    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }
}

/// Statement completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Done {
    /// Affected-row count, when the server reported one.
    pub row_count: Option<u64>,
    /// More results follow in this request.
    pub more: bool,
}

impl Done {
    /// Terminal completion with a row count.
    #[must_use]
    pub fn final_count(row_count: u64) -> Self {
        Self {
            row_count: Some(row_count),
            more: false,
        }
    }

    /// Intermediate completion; more results follow.
    #[must_use]
    pub fn more(row_count: Option<u64>) -> Self {
        Self {
            row_count,
            more: true,
        }
    }
}

/// A column value paired with its metadata, used by [`Event::Completed`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    /// Column definition.
    pub metadata: ColumnMetadata,
    /// The value.
    pub value: SqlValue,
}

/// One event in a request's result stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Column definitions for the result set that follows.
    ColumnMetadata(Vec<ColumnMetadata>),
    /// One row, positionally matching the last column metadata.
    Row(Vec<SqlValue>),
    /// Statement completion (DONE).
    Done(Done),
    /// Completion of a statement inside a procedure (DONEINPROC).
    DoneInProc(Done),
    /// Whole-request completion in the two-element form: a row count and,
    /// optionally, fully materialized rows.
    Completed {
        /// Affected-row count.
        row_count: Option<u64>,
        /// Rows with per-value metadata.
        rows: Option<Vec<Vec<ColumnValue>>>,
    },
}

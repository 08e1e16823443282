//! Session client collaborator interfaces.
//!
//! Everything that touches the wire lives behind these traits: establishing
//! a session, running statements, transaction boundaries and bulk copy. The
//! orchestration in this crate and in `tedium-pool` only ever talks to a
//! [`SessionClient`] through a [`Session`](crate::Session).

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use tedium_types::{DataType, SqlValue};

use crate::config::Config;
use crate::error::Result;
use crate::event::Event;
use crate::query::Request;
use crate::transaction::IsolationLevel;

/// Establishes new session clients.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open and authenticate one session.
    ///
    /// Failures should be reported as [`Error::Connection`](crate::Error::Connection).
    async fn connect(&self, config: &Config) -> Result<Box<dyn SessionClient>>;
}

/// One established, single-use-at-a-time server session.
///
/// Callers serialize access; no method is invoked while another is in
/// flight on the same client.
#[async_trait]
pub trait SessionClient: Send {
    /// Run a request, streaming its events.
    ///
    /// [`RequestKind::Sql`](crate::RequestKind::Sql) maps to parameterized
    /// execution, [`RequestKind::Batch`](crate::RequestKind::Batch) to a raw
    /// batch. A statement failure is yielded as an `Err` item.
    fn execute(&mut self, request: Request) -> BoxStream<'_, Result<Event>>;

    /// Begin a transaction and wait for the server's acknowledgement.
    async fn begin_transaction(
        &mut self,
        name: Option<&str>,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<()>;

    /// Commit the open transaction.
    async fn commit_transaction(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback_transaction(&mut self) -> Result<()>;

    /// Prepare a bulk copy into `table`.
    fn new_bulk_load(&mut self, table: &str) -> Result<Box<dyn BulkLoadHandle>>;

    /// Run a prepared bulk copy, returning the number of rows loaded.
    async fn exec_bulk_load(&mut self, handle: Box<dyn BulkLoadHandle>) -> Result<u64>;

    /// Close the session. Must be idempotent.
    fn close(&mut self);
}

/// Column options passed when registering a bulk copy column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkColumnOptions {
    /// Declared length for character and binary types.
    pub length: Option<u16>,
    /// Declared precision for exact numerics.
    pub precision: Option<u8>,
    /// Declared scale for exact numerics and time types.
    pub scale: Option<u8>,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Property name used to read this column from a named row.
    pub object_name: Option<String>,
}

impl BulkColumnOptions {
    /// Options derived from a declared type.
    #[must_use]
    pub fn for_type(data_type: &DataType, nullable: bool) -> Self {
        Self {
            length: data_type.length(),
            precision: data_type.precision(),
            scale: data_type.scale(),
            nullable,
            object_name: None,
        }
    }
}

/// A bulk copy being prepared by the session client.
pub trait BulkLoadHandle: Send {
    /// Register a destination column.
    fn add_column(&mut self, name: &str, data_type: DataType, options: BulkColumnOptions)
    -> Result<()>;

    /// Append one row of positional values.
    fn add_row(&mut self, row: Vec<SqlValue>) -> Result<()>;

    /// `CREATE TABLE` text for the registered columns.
    fn table_creation_sql(&self) -> String;
}

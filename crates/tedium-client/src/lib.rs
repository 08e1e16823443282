//! # tedium-client
//!
//! Session, transaction and bulk-load orchestration for SQL Server.
//!
//! The wire protocol is not implemented here. A [`Connector`] establishes
//! [`SessionClient`]s; this crate layers the session lifecycle on top of
//! them:
//!
//! - [`Session`]: a cheap, cloneable handle to one live session client.
//!   Requests on a session run one at a time and are adapted into a
//!   [`RequestResult`].
//! - [`Transaction`]: a begin/commit/rollback state machine with scoped
//!   execution through [`Session::using_transaction`].
//! - [`BulkLoad`]: staged rows flushed as one bulk copy, plus a `MERGE`
//!   generator for upserting from a staging table.
//! - [`Config`]: connection settings, parsed from a connection string.
//!
//! Pooling lives in the `tedium-pool` crate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tedium_client::{RequestOptions, TransactionOptions};
//!
//! let result = session
//!     .using_transaction(TransactionOptions::default(), |tx| async move {
//!         let result = tx
//!             .request("UPDATE stock SET qty = qty - 1 WHERE id = 7", vec![], RequestOptions::default())
//!             .await?;
//!         tx.commit().await?;
//!         Ok(result)
//!     })
//!     .await?;
//!
//! assert_eq!(result.row_count, Some(1));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod instrumentation;
pub mod query;
pub mod record;
pub mod result;
pub mod session;
pub mod transaction;

// Re-export commonly used types
pub use bulk::{BulkColumn, BulkLoad, BulkLoadOptions, BulkRow, MergeOptions};
pub use client::{BulkColumnOptions, BulkLoadHandle, Connector, SessionClient};
pub use config::{ApplicationIntent, Config, Credentials, TdsVersion};
pub use error::{Error, Result};
pub use event::{ColumnMetadata, ColumnValue, Done, Event};
pub use instrumentation::SanitizationConfig;
pub use query::{Parameter, Request, RequestKind, RequestOptions};
pub use record::Record;
pub use result::{RequestResult, Rows};
pub use session::{Session, SessionOptions, SessionOwner};
pub use tedium_types::{DataType, FromSql, SqlValue, TypedValue};
pub use transaction::{IsolationLevel, Transaction, TransactionOptions, TransactionState};

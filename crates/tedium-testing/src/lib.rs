//! # tedium-testing
//!
//! Test infrastructure for tedium.
//!
//! [`MockServer`] scripts what session clients answer and records what they
//! were asked, so sessions, transactions, bulk loads and pools can be
//! exercised without a SQL Server.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tedium_testing::{MockResponse, MockServer, connect_session};
//!
//! let server = MockServer::new();
//! server.push_response(MockResponse::rows(&["id"], vec![vec![SqlValue::Int(1)]]));
//!
//! let session = connect_session(&server, 1).await?;
//! let result = session.request("SELECT id FROM t", vec![], Default::default()).await?;
//! assert_eq!(result.records().len(), 1);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock;

pub use mock::{
    ExecutedRequest, LoadedColumn, LoadedTable, MockResponse, MockServer, TransactionCall,
};

use tedium_client::{Config, Result, Session, SessionOptions};

/// Establish one standalone session against `server`.
pub async fn connect_session(server: &MockServer, id: u64) -> Result<Session> {
    connect_session_with(server, id, SessionOptions::default()).await
}

/// Establish one standalone session with explicit options.
pub async fn connect_session_with(
    server: &MockServer,
    id: u64,
    options: SessionOptions,
) -> Result<Session> {
    let client = server.connector().connect(&Config::default()).await?;
    Ok(Session::new(id, client, options))
}

/// Install a test subscriber that honors `RUST_LOG`. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

//! # tedium-pool
//!
//! Capacity-bounded session pool for SQL Server.
//!
//! The pool hands out [`Session`](tedium_client::Session)s established
//! through a [`Connector`](tedium_client::Connector) and takes them back
//! when they are released.
//!
//! ## Features
//!
//! - Most-recently-idled reuse and a hard cap on live sessions
//! - First-come first-served waiters with an optional acquire timeout
//! - Background trimming of idle sessions down to a minimum
//! - Draining for shutdown
//! - Scoped helpers that close a session whose scope failed
//!
//! ## Example
//!
//! ```rust,ignore
//! use tedium_pool::Pool;
//! use std::time::Duration;
//!
//! let pool = Pool::builder()
//!     .connection_config(config)
//!     .connector(connector)
//!     .min_connections(2)
//!     .max_connections(20)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build()
//!     .await?;
//!
//! // Released on success, closed on failure
//! let count = pool
//!     .using(|session| async move {
//!         let result = session
//!             .request("DELETE FROM jobs WHERE done = 1", vec![], Default::default())
//!             .await?;
//!         Ok::<_, PoolError>(result.row_count)
//!     })
//!     .await?;
//!
//! // Or hold a guard that releases on drop
//! let session = pool.get().await?;
//!
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod pool;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::PoolError;

// Pool types
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus, PooledSession};

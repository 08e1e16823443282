//! Sessions: one live session client plus its bookkeeping.

use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::time::Instant;
use tracing::Instrument;

use crate::bulk::BulkLoad;
use crate::client::SessionClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::instrumentation::{self, SanitizationConfig};
use crate::query::{Parameter, Request, RequestOptions};
use crate::result::{RequestResult, collect_result};
use crate::transaction::{Transaction, TransactionOptions};

/// Behavior switches a session carries from its configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Whether the server aborts an open transaction when a statement fails.
    pub abort_transaction_on_error: bool,
    /// How statements are recorded in tracing spans.
    pub sanitization: SanitizationConfig,
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            abort_transaction_on_error: config.abort_transaction_on_error,
            sanitization: config.sanitization.clone(),
        }
    }
}

/// Whoever hands sessions out and takes them back (a pool).
pub trait SessionOwner: Send + Sync {
    /// Take a leased session back.
    fn release_session(&self, session: &Session);
}

struct ClientSlot {
    client: Box<dyn SessionClient>,
    open: bool,
}

impl ClientSlot {
    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.client.close();
        }
    }
}

struct SessionInner {
    id: u64,
    last_activity: parking_lot::Mutex<Instant>,
    owner: OnceLock<Weak<dyn SessionOwner>>,
    closed: AtomicBool,
    client: tokio::sync::Mutex<ClientSlot>,
    options: SessionOptions,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.client.get_mut().close();
    }
}

/// A handle to one live session.
///
/// Handles are cheap to clone; clones refer to the same session. Requests on
/// one session run one at a time.
///
/// Each handle carries a lease stamp. An owner hands out handles stamped per
/// lease so that a stale handle from an earlier lease can be told apart.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
    lease: u64,
}

/// Exclusive access to a session's client for the duration of one
/// operation. Closes the client on drop if the session was closed meanwhile.
pub(crate) struct ClientGuard<'a> {
    slot: tokio::sync::MutexGuard<'a, ClientSlot>,
    closed: &'a AtomicBool,
}

impl Deref for ClientGuard<'_> {
    type Target = dyn SessionClient;

    fn deref(&self) -> &Self::Target {
        self.slot.client.as_ref()
    }
}

impl DerefMut for ClientGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.slot.client.as_mut()
    }
}

impl Drop for ClientGuard<'_> {
    fn drop(&mut self) {
        if self.closed.load(Ordering::SeqCst) {
            self.slot.close();
        }
    }
}

impl Session {
    /// Wrap an established session client.
    pub fn new(id: u64, client: Box<dyn SessionClient>, options: SessionOptions) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                last_activity: parking_lot::Mutex::new(Instant::now()),
                owner: OnceLock::new(),
                closed: AtomicBool::new(false),
                client: tokio::sync::Mutex::new(ClientSlot { client, open: true }),
                options,
            }),
            lease: 0,
        }
    }

    /// Session id, unique within its pool.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Behavior switches.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// When the session was last acquired or used.
    #[must_use]
    pub fn last_activity(&self) -> Instant {
        *self.inner.last_activity.lock()
    }

    /// Mark the session as active now.
    pub fn touch(&self) {
        *self.inner.last_activity.lock() = Instant::now();
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Whether two handles refer to the same session.
    #[must_use]
    pub fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Lease stamp of this handle; 0 for a handle never leased.
    #[must_use]
    pub fn lease(&self) -> u64 {
        self.lease
    }

    /// A handle to the same session stamped with `lease`.
    #[must_use]
    pub fn with_lease(&self, lease: u64) -> Session {
        Session {
            inner: Arc::clone(&self.inner),
            lease,
        }
    }

    /// Attach the owner. Only the first call has an effect; returns whether
    /// it did.
    pub fn set_owner(&self, owner: Weak<dyn SessionOwner>) -> bool {
        self.inner.owner.set(owner).is_ok()
    }

    /// Whether an owner has been attached.
    #[must_use]
    pub fn has_owner(&self) -> bool {
        self.inner.owner.get().is_some()
    }

    /// Return the session to its owner. Without a live owner this does
    /// nothing.
    pub fn release(&self) {
        if let Some(owner) = self.inner.owner.get().and_then(Weak::upgrade) {
            owner.release_session(self);
        }
    }

    /// Close the underlying client. Idempotent.
    ///
    /// If a request currently holds the client, the client is closed once
    /// that request lets go of it.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.inner.client.try_lock() {
            Ok(mut slot) => slot.close(),
            Err(_) => {
                // the holder may already be past its closed check
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    let inner = Arc::clone(&self.inner);
                    handle.spawn(async move {
                        inner.client.lock().await.close();
                    });
                }
            }
        }
        tracing::debug!(session.id = self.id(), "session closed");
    }

    pub(crate) async fn lock_client(&self) -> Result<ClientGuard<'_>> {
        if self.is_closed() {
            return Err(Error::SessionClosed(self.id()));
        }
        let guard = ClientGuard {
            slot: self.inner.client.lock().await,
            closed: &self.inner.closed,
        };
        // closed while waiting; the guard's drop closes the client
        if self.is_closed() {
            return Err(Error::SessionClosed(self.id()));
        }
        Ok(guard)
    }

    /// Run a statement and adapt its events into a [`RequestResult`].
    ///
    /// With [`RequestOptions::batch`] the statement is sent as a raw batch;
    /// with [`RequestOptions::multiple`] every result set is returned.
    pub async fn request(
        &self,
        sql: impl Into<String>,
        params: Vec<Parameter>,
        options: RequestOptions,
    ) -> Result<RequestResult> {
        let request = Request {
            sql: sql.into(),
            params,
            kind: options.kind(),
        };
        let span =
            instrumentation::request_span(self.id(), &request.sql, &self.inner.options.sanitization);

        async {
            self.touch();
            let result = {
                let mut client = self.lock_client().await?;
                collect_result(client.execute(request), options.multiple).await
            };
            self.touch();

            if let Ok(result) = &result {
                tracing::Span::current().record("db.rows_affected", result.row_count);
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Begin a transaction on this session.
    pub async fn begin_transaction(&self, options: TransactionOptions) -> Result<Transaction> {
        Transaction::begin(self.clone(), options).await
    }

    /// Run `scope` inside a transaction.
    ///
    /// When the scope fails, the transaction is rolled back if it is still
    /// open, except for request errors on sessions configured with
    /// `abort_transaction_on_error == false`. A failed rollback is recorded on
    /// the transaction and logged; the scope's error is always the one
    /// returned. A successful scope must commit itself.
    pub async fn using_transaction<F, Fut, T>(
        &self,
        options: TransactionOptions,
        scope: F,
    ) -> Result<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let transaction = self.begin_transaction(options).await?;

        match scope(transaction.clone()).await {
            Ok(value) => {
                if transaction.is_open() {
                    tracing::warn!(
                        session.id = self.id(),
                        "transaction scope finished without commit or rollback"
                    );
                }
                Ok(value)
            }
            Err(error) => {
                if error.is_request_error() && !self.inner.options.abort_transaction_on_error {
                    tracing::debug!(
                        session.id = self.id(),
                        error = %error,
                        "request error in transaction scope; rollback skipped"
                    );
                } else if transaction.is_open() {
                    if let Err(rollback_error) = transaction.rollback().await {
                        tracing::warn!(
                            session.id = self.id(),
                            error = %rollback_error,
                            scope_error = %error,
                            "rollback after failed transaction scope failed"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    /// Stage a bulk load into `table`.
    #[must_use]
    pub fn bulk_load(&self, table: impl Into<String>) -> BulkLoad {
        BulkLoad::new(self.clone(), table)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("lease", &self.lease)
            .field("closed", &self.is_closed())
            .field("has_owner", &self.has_owner())
            .finish()
    }
}

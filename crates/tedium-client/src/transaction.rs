//! Transaction support.
//!
//! A [`Transaction`] is a state machine over one [`Session`]:
//!
//! ```text
//! Open ─► Committing ─► Committed
//!   │          │
//!   └──────────┴─► RollingBack ─► RolledBack
//! ```
//!
//! A failed commit leaves the transaction in `Committing`, from which a
//! best-effort rollback is still allowed.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use tracing::Instrument;

use crate::error::{Error, Result};
use crate::instrumentation;
use crate::query::{Parameter, RequestOptions};
use crate::result::RequestResult;
use crate::session::Session;

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Read uncommitted (dirty reads allowed).
    ReadUncommitted,
    /// Read committed (default for SQL Server).
    #[default]
    ReadCommitted,
    /// Repeatable read.
    RepeatableRead,
    /// Serializable (highest isolation).
    Serializable,
    /// Snapshot isolation.
    Snapshot,
}

impl IsolationLevel {
    /// Get the SQL statement to set this isolation level.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "SET TRANSACTION ISOLATION LEVEL READ UNCOMMITTED",
            Self::ReadCommitted => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
            Self::RepeatableRead => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            Self::Serializable => "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE",
            Self::Snapshot => "SET TRANSACTION ISOLATION LEVEL SNAPSHOT",
        }
    }
}

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Begun and usable.
    Open,
    /// Commit issued; stays here if the commit failed.
    Committing,
    /// Committed.
    Committed,
    /// Rollback issued; stays here if the rollback failed.
    RollingBack,
    /// Rolled back.
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Committing => "committing",
            Self::Committed => "committed",
            Self::RollingBack => "rolling back",
            Self::RolledBack => "rolled back",
        })
    }
}

/// Options for beginning a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Isolation level; the session's current level when `None`.
    pub isolation_level: Option<IsolationLevel>,
    /// Transaction name. Must be a plain identifier.
    pub name: Option<String>,
}

impl TransactionOptions {
    /// Set the isolation level.
    #[must_use]
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    /// Set the transaction name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A transaction bound to one session.
///
/// Cloning yields another handle to the same transaction. The caller must
/// not run conflicting transactional work on the session directly while the
/// transaction is open.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    session: Session,
    state: Mutex<TransactionState>,
    error: Mutex<Option<Error>>,
    isolation_level: Option<IsolationLevel>,
    name: Option<String>,
}

impl Transaction {
    /// Begin a transaction on `session`, waiting for the server to
    /// acknowledge it.
    pub async fn begin(session: Session, options: TransactionOptions) -> Result<Self> {
        if let Some(name) = &options.name {
            validate_identifier(name)?;
        }

        let span = instrumentation::transaction_span(session.id(), "BEGIN");
        async {
            let mut client = session.lock_client().await?;
            client
                .begin_transaction(options.name.as_deref(), options.isolation_level)
                .await
        }
        .instrument(span)
        .await?;

        tracing::debug!(
            session.id = session.id(),
            name = ?options.name,
            isolation_level = ?options.isolation_level,
            "transaction begun"
        );

        Ok(Self {
            inner: Arc::new(TransactionInner {
                session,
                state: Mutex::new(TransactionState::Open),
                error: Mutex::new(None),
                isolation_level: options.isolation_level,
                name: options.name,
            }),
        })
    }

    /// Commit the transaction.
    ///
    /// Fails with [`Error::InvalidState`] unless the transaction is open. A
    /// failed commit is recorded and leaves the transaction in
    /// [`TransactionState::Committing`].
    pub async fn commit(&self) -> Result<()> {
        self.transition("commit", &[TransactionState::Open], TransactionState::Committing)?;

        let session = &self.inner.session;
        let span = instrumentation::transaction_span(session.id(), "COMMIT");
        let result = async {
            let mut client = session.lock_client().await?;
            client.commit_transaction().await
        }
        .instrument(span)
        .await;

        self.settle(result, TransactionState::Committed)
    }

    /// Roll back the transaction.
    ///
    /// Allowed from [`TransactionState::Open`] and, after a failed commit,
    /// from [`TransactionState::Committing`].
    pub async fn rollback(&self) -> Result<()> {
        self.transition(
            "rollback",
            &[TransactionState::Open, TransactionState::Committing],
            TransactionState::RollingBack,
        )?;

        let session = &self.inner.session;
        let span = instrumentation::transaction_span(session.id(), "ROLLBACK");
        let result = async {
            let mut client = session.lock_client().await?;
            client.rollback_transaction().await
        }
        .instrument(span)
        .await;

        self.settle(result, TransactionState::RolledBack)
    }

    fn transition(
        &self,
        operation: &'static str,
        from: &[TransactionState],
        to: TransactionState,
    ) -> Result<()> {
        let mut state = self.inner.state.lock();
        if !from.contains(&*state) {
            return Err(Error::InvalidState {
                operation,
                state: *state,
            });
        }
        *state = to;
        Ok(())
    }

    fn settle(&self, result: Result<()>, done: TransactionState) -> Result<()> {
        match result {
            Ok(()) => {
                *self.inner.state.lock() = done;
                tracing::debug!(session.id = self.inner.session.id(), state = %done, "transaction finished");
                Ok(())
            }
            Err(e) => {
                *self.inner.error.lock() = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Run a request inside the transaction.
    pub async fn request(
        &self,
        sql: impl Into<String>,
        params: Vec<Parameter>,
        options: RequestOptions,
    ) -> Result<RequestResult> {
        self.inner.session.request(sql, params, options).await
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        *self.inner.state.lock()
    }

    /// Whether the transaction is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == TransactionState::Open
    }

    /// The error of the last failed commit or rollback.
    #[must_use]
    pub fn error(&self) -> Option<Error> {
        self.inner.error.lock().clone()
    }

    /// Isolation level requested at begin.
    #[must_use]
    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.inner.isolation_level
    }

    /// Transaction name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// The owning session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("session", &self.inner.session.id())
            .field("state", &self.state())
            .field("name", &self.inner.name)
            .finish()
    }
}

static IDENTIFIER_RE: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_@#$]{0,127}$"));

/// Validate an identifier (transaction name) to prevent SQL injection.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier(
            "identifier cannot be empty".into(),
        ));
    }

    let re = IDENTIFIER_RE
        .as_ref()
        .map_err(|e| Error::InvalidIdentifier(e.to_string()))?;

    if !re.is_match(name) {
        return Err(Error::InvalidIdentifier(format!(
            "invalid identifier '{name}': must start with letter/underscore, \
             contain only alphanumerics/_/@/#/$, and be 1-128 characters"
        )));
    }

    Ok(())
}

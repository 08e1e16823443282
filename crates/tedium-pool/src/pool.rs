//! Session pool implementation.
//!
//! All bookkeeping lives in one [`PoolState`] behind a `parking_lot` mutex
//! that is never held across an await. The only suspension points inside
//! [`Pool::acquire`] are establishing a new session and waiting on a
//! waiter's hand-off channel.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tedium_client::{
    Config, Connector, Error, Parameter, RequestOptions, RequestResult, Session, SessionOptions,
    SessionOwner, Transaction, TransactionOptions,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::error::PoolError;

/// A pool of sessions to one database.
///
/// Idle sessions are reused most-recently-idled first. When every session
/// is leased and the pool is at capacity, callers queue and are served in
/// arrival order. Sessions idle longer than the idle timeout are trimmed
/// by a background task, never below the configured minimum.
///
/// # Example
///
/// ```rust,ignore
/// use tedium_pool::{Pool, PoolConfig};
///
/// let pool = Pool::builder()
///     .connection_config(Config::from_connection_string("server=db01;database=sales")?)
///     .connector(connector)
///     .max_connections(10)
///     .build()
///     .await?;
///
/// let result = pool
///     .request("SELECT id, name FROM items", vec![], RequestOptions::default())
///     .await?;
/// ```
#[derive(Clone)]
pub struct Pool {
    config: PoolConfig,
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    config: PoolConfig,
    client_config: Config,
    connector: Arc<dyn Connector>,
    self_ref: Weak<PoolInner>,

    state: Mutex<PoolState>,

    /// One-way; set by `auto_drain`.
    draining: AtomicBool,

    /// Session ids start at 1 and are never reused.
    next_session_id: AtomicU64,

    created_at: std::time::Instant,

    metrics: Mutex<PoolMetricsInner>,

    reaper: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct PoolState {
    /// Every session ever registered; closed ones map to `None`.
    sessions: BTreeMap<u64, Option<Session>>,
    /// Most recently idled last.
    idle: Vec<Session>,
    waiters: VecDeque<oneshot::Sender<Handoff>>,
    /// Live sessions.
    count: u32,
    /// Connection attempts holding a capacity slot.
    connecting: u32,
    /// Current lease stamp of each leased session.
    leases: BTreeMap<u64, u64>,
    next_lease: u64,
}

impl PoolState {
    fn is_tracked(&self, session: &Session) -> bool {
        matches!(self.sessions.get(&session.id()), Some(Some(s)) if s.ptr_eq(session))
    }

    /// Whether `session` is the handle of a session's current lease.
    fn is_leased(&self, session: &Session) -> bool {
        self.is_tracked(session) && self.leases.get(&session.id()) == Some(&session.lease())
    }

    /// Start a new lease on `session` and return the handle stamped for it.
    fn stamp(&mut self, session: &Session) -> Session {
        self.next_lease += 1;
        self.leases.insert(session.id(), self.next_lease);
        session.with_lease(self.next_lease)
    }

    fn occupied(&self) -> u32 {
        self.count + self.connecting
    }

    fn live_waiters(&self) -> usize {
        self.waiters.iter().filter(|w| !w.is_closed()).count()
    }
}

/// What a queued caller is handed.
enum Handoff {
    /// A leased session.
    Session(Session),
    /// A reserved capacity slot; the caller connects.
    Capacity,
    /// The pool is draining and nothing is left to serve the caller.
    Draining,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    sessions_created: u64,
    sessions_closed: u64,
    checkouts_successful: u64,
    checkouts_failed: u64,
    waits: u64,
    timeouts: u64,
    idle_evictions: u64,
}

/// A reserved capacity slot. Returned to the pool on drop unless the
/// connection attempt registered a session.
struct Reservation<'a> {
    pool: &'a PoolInner,
    armed: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.pool.state.lock();
            state.connecting -= 1;
            self.pool.dispatch_capacity(&mut state);
        }
    }
}

/// A queued acquire. On drop, anything already handed to it goes back to
/// the pool.
struct Waiter<'a> {
    rx: oneshot::Receiver<Handoff>,
    pool: &'a PoolInner,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(handoff) = self.rx.try_recv() {
            self.pool.reclaim(handoff);
        }
    }
}

enum Step {
    Ready(Session),
    Connect,
    Wait(oneshot::Receiver<Handoff>),
}

impl PoolInner {
    fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    async fn acquire(&self) -> Result<Session, PoolError> {
        let step = {
            let mut state = self.state.lock();
            loop {
                if let Some(session) = state.idle.pop() {
                    if session.is_closed() {
                        self.untrack(&mut state, &session);
                        continue;
                    }
                    break Step::Ready(state.stamp(&session));
                }

                if !self.is_draining() && state.occupied() < self.config.max_connections {
                    state.connecting += 1;
                    break Step::Connect;
                }

                if self.is_draining() && state.occupied() == 0 {
                    return Err(PoolError::Draining);
                }

                state.waiters.retain(|w| !w.is_closed());
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                break Step::Wait(rx);
            }
        };

        match step {
            Step::Ready(session) => {
                tracing::trace!(session.id = session.id(), "reusing idle session");
                Ok(session)
            }
            Step::Connect => self.connect_reserved().await,
            Step::Wait(rx) => {
                self.metrics.lock().waits += 1;
                tracing::trace!("pool at capacity; waiting for a session");

                let mut waiter = Waiter { rx, pool: self };
                let handoff = (&mut waiter.rx).await;
                drop(waiter);

                match handoff {
                    Ok(Handoff::Session(session)) => {
                        tracing::trace!(session.id = session.id(), "received session from release");
                        Ok(session)
                    }
                    Ok(Handoff::Capacity) => self.connect_reserved().await,
                    Ok(Handoff::Draining) | Err(_) => Err(PoolError::Draining),
                }
            }
        }
    }

    /// Establish a session on a slot the caller already reserved.
    async fn connect_reserved(&self) -> Result<Session, PoolError> {
        let mut reservation = Reservation {
            pool: self,
            armed: true,
        };

        let timeout = self.client_config.connect_timeout;
        let client = match tokio::time::timeout(timeout, self.connector.connect(&self.client_config))
            .await
        {
            Ok(Ok(client)) => client,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(Error::Connection(format!("connect timed out after {timeout:?}")).into());
            }
        };

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::new(id, client, SessionOptions::from(&self.client_config));
        let owner: Weak<dyn SessionOwner> = self.self_ref.clone();
        session.set_owner(owner);

        let session = {
            let mut state = self.state.lock();
            state.connecting -= 1;
            state.count += 1;
            state.sessions.insert(id, Some(session.clone()));
            reservation.armed = false;
            state.stamp(&session)
        };

        self.metrics.lock().sessions_created += 1;
        tracing::info!(
            session.id = id,
            host = %self.client_config.host,
            "session established"
        );
        Ok(session)
    }

    /// Put back whatever a cancelled waiter was handed.
    fn reclaim(&self, handoff: Handoff) {
        match handoff {
            Handoff::Session(session) => self.release_leased(&session),
            Handoff::Capacity => {
                let mut state = self.state.lock();
                state.connecting -= 1;
                self.dispatch_capacity(&mut state);
            }
            Handoff::Draining => {}
        }
    }

    /// Offer free capacity to queued callers. While draining, fail them
    /// once no session is left that could serve them.
    fn dispatch_capacity(&self, state: &mut PoolState) {
        if self.is_draining() {
            if state.occupied() == 0 {
                for waiter in state.waiters.drain(..) {
                    let _ = waiter.send(Handoff::Draining);
                }
            }
            return;
        }

        while state.occupied() < self.config.max_connections {
            let Some(waiter) = state.waiters.pop_front() else {
                return;
            };
            state.connecting += 1;
            if waiter.send(Handoff::Capacity).is_err() {
                state.connecting -= 1;
            }
        }
    }

    fn release_locked(&self, state: &mut PoolState, session: &Session) {
        if !state.is_leased(session) {
            tracing::trace!(
                session.id = session.id(),
                lease = session.lease(),
                "release ignored; not the current lease"
            );
            return;
        }
        state.leases.remove(&session.id());

        if session.is_closed() {
            self.untrack(state, session);
            return;
        }

        while let Some(waiter) = state.waiters.pop_front() {
            let handed = state.stamp(session);
            if waiter.send(Handoff::Session(handed)).is_ok() {
                tracing::trace!(session.id = session.id(), "session handed to waiter");
                return;
            }
        }
        state.leases.remove(&session.id());

        let session = session.with_lease(0);
        session.touch();
        tracing::trace!(session.id = session.id(), "session idle");
        state.idle.push(session);

        if self.is_draining() {
            self.trim_locked(state);
        }
    }

    fn release_leased(&self, session: &Session) {
        let mut state = self.state.lock();
        self.release_locked(&mut state, session);
    }

    fn close_session(&self, session: &Session) {
        session.close();
        let mut state = self.state.lock();
        state.idle.retain(|s| !s.ptr_eq(session));
        self.untrack(&mut state, session);
    }

    /// Drop a closed session from the books and offer its capacity.
    fn untrack(&self, state: &mut PoolState, session: &Session) {
        if state.is_tracked(session) {
            state.sessions.insert(session.id(), None);
            state.leases.remove(&session.id());
            state.count -= 1;
            self.metrics.lock().sessions_closed += 1;
            tracing::debug!(session.id = session.id(), count = state.count, "session untracked");
        }
        self.dispatch_capacity(state);
    }

    fn trim(&self) {
        let mut state = self.state.lock();
        self.trim_locked(&mut state);
    }

    fn trim_locked(&self, state: &mut PoolState) {
        let draining = self.is_draining();
        let cutoff = Instant::now().checked_sub(self.config.idle_timeout);

        let mut i = 0;
        while i < state.idle.len() {
            if !draining && state.count <= self.config.min_connections {
                break;
            }

            let expired = draining
                || cutoff.is_some_and(|cutoff| state.idle[i].last_activity() < cutoff);
            if expired {
                let session = state.idle.remove(i);
                session.close();
                self.metrics.lock().idle_evictions += 1;
                tracing::trace!(session.id = session.id(), draining, "trimming idle session");
                self.untrack(state, &session);
            } else {
                i += 1;
            }
        }
    }
}

impl SessionOwner for PoolInner {
    fn release_session(&self, session: &Session) {
        self.release_leased(session);
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.get_mut().take() {
            reaper.abort();
        }
        for session in self.state.get_mut().idle.drain(..) {
            session.close();
        }
    }
}

fn spawn_reaper(inner: &Arc<PoolInner>) -> JoinHandle<()> {
    let pool = Arc::downgrade(inner);
    let period = inner.config.idle_timeout;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;
            let Some(pool) = pool.upgrade() else {
                break;
            };
            pool.trim();
        }
    })
}

impl Pool {
    /// Create a new pool builder.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a pool. No session is established until the first acquire;
    /// [`PoolBuilder::build`] additionally probes the configuration.
    ///
    /// Must be called from within a Tokio runtime (the idle reaper is
    /// spawned here).
    pub async fn new(
        config: PoolConfig,
        client_config: Config,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, PoolError> {
        config.validate()?;

        let inner = Arc::new_cyclic(|self_ref| PoolInner {
            config: config.clone(),
            client_config,
            connector,
            self_ref: self_ref.clone(),
            state: Mutex::new(PoolState::default()),
            draining: AtomicBool::new(false),
            next_session_id: AtomicU64::new(1),
            created_at: std::time::Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
            reaper: Mutex::new(None),
        });
        *inner.reaper.lock() = Some(spawn_reaper(&inner));

        tracing::info!(
            min = config.min_connections,
            max = config.max_connections,
            idle_timeout = ?config.idle_timeout,
            "connection pool created"
        );

        Ok(Self { config, inner })
    }

    /// Acquire a session.
    ///
    /// Returns the most recently idled session, establishes a new one if
    /// capacity allows, or waits in line for one. With
    /// [`PoolConfig::connection_timeout`] set, waiting longer fails with
    /// [`PoolError::Timeout`]. Dropping the returned future gives back
    /// anything it had already been handed.
    ///
    /// The session must be given back with [`release`](Self::release) or
    /// [`close`](Self::close); prefer [`using`](Self::using) or
    /// [`get`](Self::get).
    pub async fn acquire(&self) -> Result<Session, PoolError> {
        let result = match self.config.connection_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.inner.acquire()).await {
                Ok(result) => result,
                Err(_) => {
                    self.inner.metrics.lock().timeouts += 1;
                    Err(PoolError::Timeout(timeout))
                }
            },
            None => self.inner.acquire().await,
        };

        let mut metrics = self.inner.metrics.lock();
        match &result {
            Ok(session) => {
                metrics.checkouts_successful += 1;
                session.touch();
            }
            Err(e) => {
                metrics.checkouts_failed += 1;
                tracing::debug!(error = %e, "acquire failed");
            }
        }
        result
    }

    /// Acquire a session wrapped in a guard that releases it on drop.
    pub async fn get(&self) -> Result<PooledSession, PoolError> {
        let session = self.acquire().await?;
        Ok(PooledSession {
            session,
            pool: Arc::clone(&self.inner),
            on_drop: DropAction::Release,
            armed: true,
        })
    }

    /// Return a leased session.
    ///
    /// Does nothing unless `session` is the handle of the session's current
    /// lease from this pool, so releasing twice is harmless even after the
    /// session was handed on to another caller. A session closed while leased is
    /// dropped from the pool instead.
    pub fn release(&self, session: &Session) {
        self.inner.release_leased(session);
    }

    /// Close a session and free its capacity.
    pub fn close(&self, session: &Session) {
        self.inner.close_session(session);
    }

    /// Close idle sessions past the idle timeout, keeping at least
    /// `min_connections` live sessions. While draining, close every idle
    /// session.
    ///
    /// The longest-idle sessions are closed first, so the sessions kept at
    /// the `min_connections` floor are the most recently idled ones. This
    /// deliberately departs from trimming newest-first, which would keep the
    /// stalest sessions alive.
    pub fn trim(&self) {
        self.inner.trim();
    }

    /// Start draining: the pool stops establishing sessions, closes idle
    /// ones now and closes every session as it is released. Sticky.
    pub fn auto_drain(&self) {
        if !self.inner.draining.swap(true, Ordering::AcqRel) {
            tracing::info!("connection pool draining");
        }
        let mut state = self.inner.state.lock();
        self.inner.trim_locked(&mut state);
        self.inner.dispatch_capacity(&mut state);
    }

    /// Whether [`auto_drain`](Self::auto_drain) has been called.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.inner.is_draining()
    }

    /// Run `scope` with a session.
    ///
    /// The session is released when the scope succeeds and closed when it
    /// fails, panics or is cancelled. The scope's error is returned
    /// unchanged.
    pub async fn using<F, Fut, T, E>(&self, scope: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<PoolError>,
    {
        let mut pooled = self.get().await?;
        pooled.on_drop = DropAction::Close;

        match scope(pooled.session.clone()).await {
            Ok(value) => {
                pooled.release();
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(session.id = pooled.id(), "scope failed; closing session");
                pooled.close();
                Err(e)
            }
        }
    }

    /// Run `scope` inside a transaction on a pooled session.
    ///
    /// See [`Session::using_transaction`] for the rollback rules.
    pub async fn using_transaction<F, Fut, T>(
        &self,
        options: TransactionOptions,
        scope: F,
    ) -> Result<T, PoolError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = tedium_client::Result<T>>,
    {
        self.using(|session| async move {
            session
                .using_transaction(options, scope)
                .await
                .map_err(PoolError::from)
        })
        .await
    }

    /// Run one request on a pooled session.
    pub async fn request(
        &self,
        sql: impl Into<String>,
        params: Vec<Parameter>,
        options: RequestOptions,
    ) -> Result<RequestResult, PoolError> {
        let sql = sql.into();
        self.using(|session| async move {
            session
                .request(sql, params, options)
                .await
                .map_err(PoolError::from)
        })
        .await
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        let available = state.idle.len() as u32;
        PoolStatus {
            available,
            in_use: state.count.saturating_sub(available),
            total: state.count,
            max: self.config.max_connections,
            waiting: state.live_waiters() as u32,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            sessions_created: inner.sessions_created,
            sessions_closed: inner.sessions_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            waits: inner.waits,
            timeouts: inner.timeouts,
            idle_evictions: inner.idle_evictions,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Look up a live session by id.
    #[must_use]
    pub fn session(&self, id: u64) -> Option<Session> {
        self.inner.state.lock().sessions.get(&id).cloned().flatten()
    }

    /// Ids of idle sessions, most recently idled last.
    #[must_use]
    pub fn idle_session_ids(&self) -> Vec<u64> {
        self.inner.state.lock().idle.iter().map(Session::id).collect()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("draining", &self.is_draining())
            .finish()
    }
}

/// Builder for creating a pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder()
///     .connection_config(config)
///     .connector(Arc::new(connector))
///     .min_connections(2)
///     .idle_timeout(Duration::from_secs(60))
///     .build()
///     .await?;
/// ```
pub struct PoolBuilder {
    pool_config: PoolConfig,
    client_config: Config,
    connector: Option<Arc<dyn Connector>>,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self {
            pool_config: PoolConfig::default(),
            client_config: Config::default(),
            connector: None,
        }
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Set the configuration sessions are established with.
    #[must_use]
    pub fn connection_config(mut self, config: Config) -> Self {
        self.client_config = config;
        self
    }

    /// Set the connector that establishes sessions.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the minimum number of sessions.
    #[must_use]
    pub fn min_connections(mut self, count: u32) -> Self {
        self.pool_config.min_connections = count;
        self
    }

    /// Set the maximum number of sessions.
    #[must_use]
    pub fn max_connections(mut self, count: u32) -> Self {
        self.pool_config.max_connections = count;
        self
    }

    /// Bound how long `acquire` waits.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.connection_timeout = Some(timeout);
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = timeout;
        self
    }

    /// Build the pool and probe the configuration by establishing and
    /// releasing one session.
    pub async fn build(self) -> Result<Pool, PoolError> {
        let connector = self
            .connector
            .ok_or_else(|| PoolError::Configuration("no connector configured".into()))?;
        let pool = Pool::new(self.pool_config, self.client_config, connector).await?;

        let session = pool.acquire().await?;
        pool.release(&session);

        Ok(pool)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle sessions.
    pub available: u32,
    /// Number of sessions currently leased.
    pub in_use: u32,
    /// Total number of live sessions.
    pub total: u32,
    /// Maximum allowed sessions.
    pub max: u32,
    /// Callers waiting for a session.
    pub waiting: u32,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Sessions established since pool start.
    pub sessions_created: u64,
    /// Sessions closed since pool start.
    pub sessions_closed: u64,
    /// Successful acquires.
    pub checkouts_successful: u64,
    /// Failed acquires (connect errors, timeouts, draining).
    pub checkouts_failed: u64,
    /// Acquires that had to queue.
    pub waits: u64,
    /// Acquires that hit the acquire timeout.
    pub timeouts: u64,
    /// Sessions closed by trimming.
    pub idle_evictions: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropAction {
    Release,
    Close,
}

/// A session leased from the pool.
///
/// When dropped, the session is released back to the pool. Use
/// [`close`](PooledSession::close) to discard it instead, or
/// [`detach`](PooledSession::detach) to take manual control.
pub struct PooledSession {
    session: Session,
    pool: Arc<PoolInner>,
    on_drop: DropAction,
    armed: bool,
}

impl PooledSession {
    /// The session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Release the session back to the pool now.
    pub fn release(mut self) {
        self.armed = false;
        self.pool.release_leased(&self.session);
    }

    /// Close the session instead of returning it.
    pub fn close(mut self) {
        self.armed = false;
        self.pool.close_session(&self.session);
    }

    /// Take the session out of the guard.
    ///
    /// The pool keeps counting it against capacity until it is released
    /// (see [`Session::release`]) or closed through the pool.
    #[must_use]
    pub fn detach(mut self) -> Session {
        self.armed = false;
        self.session.clone()
    }
}

impl Deref for PooledSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match self.on_drop {
            DropAction::Release => {
                tracing::trace!(session.id = self.session.id(), "returning session to pool");
                self.pool.release_leased(&self.session);
            }
            DropAction::Close => {
                tracing::debug!(session.id = self.session.id(), "closing abandoned session");
                self.pool.close_session(&self.session);
            }
        }
    }
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_status_utilization() {
        let status = PoolStatus {
            available: 5,
            in_use: 5,
            total: 10,
            max: 20,
            waiting: 0,
        };
        assert!((status.utilization() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pool_status_at_capacity() {
        let status = PoolStatus {
            available: 0,
            in_use: 10,
            total: 10,
            max: 10,
            waiting: 3,
        };
        assert!(status.is_at_capacity());

        let status2 = PoolStatus {
            available: 5,
            in_use: 5,
            total: 10,
            max: 20,
            waiting: 0,
        };
        assert!(!status2.is_at_capacity());
    }

    #[test]
    fn test_pool_metrics_success_rate() {
        let metrics = PoolMetrics {
            sessions_created: 10,
            sessions_closed: 2,
            checkouts_successful: 90,
            checkouts_failed: 10,
            waits: 4,
            timeouts: 1,
            idle_evictions: 2,
            uptime: Duration::from_secs(3600),
        };

        assert!((metrics.checkout_success_rate() - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_builder_fluent() {
        let builder = Pool::builder()
            .min_connections(5)
            .max_connections(50)
            .idle_timeout(Duration::from_secs(60))
            .connection_timeout(Duration::from_secs(2));

        assert_eq!(builder.pool_config.min_connections, 5);
        assert_eq!(builder.pool_config.max_connections, 50);
        assert_eq!(builder.pool_config.idle_timeout, Duration::from_secs(60));
        assert_eq!(
            builder.pool_config.connection_timeout,
            Some(Duration::from_secs(2))
        );
    }

    #[tokio::test]
    async fn test_build_requires_connector() {
        let err = Pool::builder().build().await.unwrap_err();
        assert!(matches!(err, PoolError::Configuration(_)));
    }
}

//! Scripted in-memory session clients.
//!
//! A [`MockServer`] hands out session clients through
//! [`MockServer::connector`]. Every client shares the server's script and
//! log: responses are consumed in order by whichever client executes next,
//! and everything the clients are asked to do is recorded for assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use parking_lot::Mutex;
use tedium_client::bulk::quote_identifier;
use tedium_client::{
    BulkColumnOptions, BulkLoadHandle, ColumnMetadata, Config, Connector, DataType, Done, Error,
    Event, IsolationLevel, Request, Result, SessionClient, SqlValue,
};
use tokio::sync::Notify;

/// A scripted reply to one request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Emit these events.
    Events(Vec<Event>),
    /// Emit these events, then fail.
    Fail {
        /// Events emitted before the error.
        events: Vec<Event>,
        /// The error ending the stream.
        error: Error,
    },
    /// Hold the request until the gate is notified, then emit the events.
    Gated {
        /// Released with `notify_one`.
        gate: Arc<Notify>,
        /// Events emitted once released.
        events: Vec<Event>,
    },
}

impl MockResponse {
    /// One result set with the given column names, finished by a final
    /// count of its rows.
    pub fn rows(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> Self {
        let count = rows.len() as u64;
        let mut events = vec![Event::ColumnMetadata(
            columns.iter().map(|name| ColumnMetadata::named(*name)).collect(),
        )];
        events.extend(rows.into_iter().map(Event::Row));
        events.push(Event::Done(Done::final_count(count)));
        Self::Events(events)
    }

    /// A statement that affected `count` rows and returned none.
    pub fn row_count(count: u64) -> Self {
        Self::Events(vec![Event::Done(Done::final_count(count))])
    }

    /// A statement that failed with a server error.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Fail {
            events: Vec::new(),
            error: Error::request(message),
        }
    }

    fn into_stream(self) -> BoxStream<'static, Result<Event>> {
        match self {
            Self::Events(events) => stream::iter(events.into_iter().map(Ok)).boxed(),
            Self::Fail { events, error } => stream::iter(
                events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error))),
            )
            .boxed(),
            Self::Gated { gate, events } => stream::once(async move {
                gate.notified().await;
                stream::iter(events.into_iter().map(Ok))
            })
            .flatten()
            .boxed(),
        }
    }
}

/// A request as a client received it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedRequest {
    /// Client that ran it.
    pub client: u64,
    /// The request.
    pub request: Request,
}

/// A transaction boundary a client was asked to cross.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionCall {
    /// `begin_transaction`.
    Begin {
        /// Client that was asked.
        client: u64,
        /// Transaction name.
        name: Option<String>,
        /// Requested isolation level.
        isolation_level: Option<IsolationLevel>,
    },
    /// `commit_transaction`.
    Commit {
        /// Client that was asked.
        client: u64,
    },
    /// `rollback_transaction`.
    Rollback {
        /// Client that was asked.
        client: u64,
    },
}

/// A column registered on a bulk load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedColumn {
    /// Column name.
    pub name: String,
    /// Declared type.
    pub data_type: DataType,
    /// Options passed alongside.
    pub options: BulkColumnOptions,
}

/// A bulk load that was executed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedTable {
    /// Client that executed it.
    pub client: u64,
    /// Destination table as passed to the client.
    pub table: String,
    /// Registered columns, in order.
    pub columns: Vec<LoadedColumn>,
    /// Rows as handed to the client.
    pub rows: Vec<Vec<SqlValue>>,
}

#[derive(Default)]
struct MockState {
    responses: VecDeque<MockResponse>,
    connect_failures: VecDeque<Error>,
    connect_delay: Option<Duration>,
    begin_failures: VecDeque<Error>,
    commit_failures: VecDeque<Error>,
    rollback_failures: VecDeque<Error>,
    bulk_failures: VecDeque<Error>,

    next_client: u64,
    connects: u64,
    closes: Vec<u64>,
    requests: Vec<ExecutedRequest>,
    transactions: Vec<TransactionCall>,
    bulk_loads: Vec<LoadedTable>,
}

/// An in-memory stand-in for a SQL Server.
///
/// Cloning yields another handle to the same server.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    /// Create a server with an empty script. Unscripted requests finish
    /// with a bare `Done` and no row count.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connector establishing clients against this server.
    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(MockConnector {
            server: self.clone(),
        })
    }

    /// Queue the reply to the next request.
    pub fn push_response(&self, response: MockResponse) {
        self.state.lock().responses.push_back(response);
    }

    /// Scripted replies not yet consumed.
    pub fn pending_responses(&self) -> usize {
        self.state.lock().responses.len()
    }

    /// Fail the next connection attempt.
    pub fn fail_next_connect(&self, error: Error) {
        self.state.lock().connect_failures.push_back(error);
    }

    /// Delay every connection attempt.
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    /// Fail the next `begin_transaction`.
    pub fn fail_next_begin(&self, error: Error) {
        self.state.lock().begin_failures.push_back(error);
    }

    /// Fail the next `commit_transaction`.
    pub fn fail_next_commit(&self, error: Error) {
        self.state.lock().commit_failures.push_back(error);
    }

    /// Fail the next `rollback_transaction`.
    pub fn fail_next_rollback(&self, error: Error) {
        self.state.lock().rollback_failures.push_back(error);
    }

    /// Fail the next `exec_bulk_load`.
    pub fn fail_next_bulk_load(&self, error: Error) {
        self.state.lock().bulk_failures.push_back(error);
    }

    /// Successful connections so far.
    pub fn connects(&self) -> u64 {
        self.state.lock().connects
    }

    /// Ids of clients that were closed, in closing order.
    pub fn closed_clients(&self) -> Vec<u64> {
        self.state.lock().closes.clone()
    }

    /// Every request executed so far.
    pub fn requests(&self) -> Vec<ExecutedRequest> {
        self.state.lock().requests.clone()
    }

    /// SQL text of every request executed so far.
    pub fn sql_log(&self) -> Vec<String> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| r.request.sql.clone())
            .collect()
    }

    /// Every transaction boundary requested so far.
    pub fn transactions(&self) -> Vec<TransactionCall> {
        self.state.lock().transactions.clone()
    }

    /// Every bulk load executed so far.
    pub fn bulk_loads(&self) -> Vec<LoadedTable> {
        self.state.lock().bulk_loads.clone()
    }
}

impl std::fmt::Debug for MockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockServer")
            .field("connects", &state.connects)
            .field("pending_responses", &state.responses.len())
            .field("requests", &state.requests.len())
            .finish()
    }
}

struct MockConnector {
    server: MockServer,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &Config) -> Result<Box<dyn SessionClient>> {
        let delay = self.server.state.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.server.state.lock();
        if let Some(error) = state.connect_failures.pop_front() {
            tracing::debug!(host = %config.host, "mock connect failing");
            return Err(error);
        }
        state.next_client += 1;
        state.connects += 1;

        Ok(Box::new(MockClient {
            id: state.next_client,
            server: self.server.clone(),
            pending_loads: VecDeque::new(),
            closed: false,
        }))
    }
}

struct MockClient {
    id: u64,
    server: MockServer,
    pending_loads: VecDeque<Arc<Mutex<LoadedTable>>>,
    closed: bool,
}

impl MockClient {
    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Connection(format!("client {} is closed", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionClient for MockClient {
    fn execute(&mut self, request: Request) -> BoxStream<'_, Result<Event>> {
        if let Err(e) = self.check_open() {
            return stream::iter([Err(e)]).boxed();
        }

        let mut state = self.server.state.lock();
        state.requests.push(ExecutedRequest {
            client: self.id,
            request,
        });
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| MockResponse::Events(vec![Event::Done(Done::default())]))
            .into_stream()
    }

    async fn begin_transaction(
        &mut self,
        name: Option<&str>,
        isolation_level: Option<IsolationLevel>,
    ) -> Result<()> {
        self.check_open()?;
        let mut state = self.server.state.lock();
        state.transactions.push(TransactionCall::Begin {
            client: self.id,
            name: name.map(str::to_owned),
            isolation_level,
        });
        state.begin_failures.pop_front().map_or(Ok(()), Err)
    }

    async fn commit_transaction(&mut self) -> Result<()> {
        self.check_open()?;
        let mut state = self.server.state.lock();
        state.transactions.push(TransactionCall::Commit { client: self.id });
        state.commit_failures.pop_front().map_or(Ok(()), Err)
    }

    async fn rollback_transaction(&mut self) -> Result<()> {
        self.check_open()?;
        let mut state = self.server.state.lock();
        state.transactions.push(TransactionCall::Rollback { client: self.id });
        state.rollback_failures.pop_front().map_or(Ok(()), Err)
    }

    fn new_bulk_load(&mut self, table: &str) -> Result<Box<dyn BulkLoadHandle>> {
        self.check_open()?;
        let load = Arc::new(Mutex::new(LoadedTable {
            client: self.id,
            table: table.to_owned(),
            ..LoadedTable::default()
        }));
        self.pending_loads.push_back(Arc::clone(&load));
        Ok(Box::new(MockBulkLoad { load }))
    }

    async fn exec_bulk_load(&mut self, handle: Box<dyn BulkLoadHandle>) -> Result<u64> {
        self.check_open()?;
        drop(handle);
        let Some(load) = self.pending_loads.pop_front() else {
            return Err(Error::BulkLoad("no bulk load prepared".into()));
        };

        let mut state = self.server.state.lock();
        if let Some(error) = state.bulk_failures.pop_front() {
            return Err(error);
        }
        let load = load.lock().clone();
        let rows = load.rows.len() as u64;
        state.bulk_loads.push(load);
        Ok(rows)
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.server.state.lock().closes.push(self.id);
        }
    }
}

struct MockBulkLoad {
    load: Arc<Mutex<LoadedTable>>,
}

impl BulkLoadHandle for MockBulkLoad {
    fn add_column(
        &mut self,
        name: &str,
        data_type: DataType,
        options: BulkColumnOptions,
    ) -> Result<()> {
        let mut load = self.load.lock();
        if !load.rows.is_empty() {
            return Err(Error::BulkLoad(
                "columns cannot be added after rows".into(),
            ));
        }
        if load.columns.iter().any(|c| c.name == name) {
            return Err(Error::BulkLoad(format!("duplicate column '{name}'")));
        }
        load.columns.push(LoadedColumn {
            name: name.to_owned(),
            data_type,
            options,
        });
        Ok(())
    }

    fn add_row(&mut self, row: Vec<SqlValue>) -> Result<()> {
        let mut load = self.load.lock();
        if row.len() != load.columns.len() {
            return Err(Error::BulkLoad(format!(
                "row has {} values for {} columns",
                row.len(),
                load.columns.len()
            )));
        }
        load.rows.push(row);
        Ok(())
    }

    fn table_creation_sql(&self) -> String {
        let load = self.load.lock();
        let columns = load
            .columns
            .iter()
            .map(|c| {
                let null = if c.options.nullable { "NULL" } else { "NOT NULL" };
                format!("{} {} {}", quote_identifier(&c.name), c.data_type, null)
            })
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {}(\n{}\n)", quote_identifier(&load.table), columns)
    }
}

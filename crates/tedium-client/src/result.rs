//! Folding a request's event stream into a structured result.

use std::sync::Arc;

use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::Result;
use crate::event::{ColumnMetadata, ColumnValue, Done, Event};
use crate::record::Record;

/// Row data of a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    /// The first result set.
    Single(Vec<Record>),
    /// Every result set, in order.
    Multiple(Vec<Vec<Record>>),
}

impl Rows {
    /// The first result set, if any.
    #[must_use]
    pub fn first(&self) -> Option<&[Record]> {
        match self {
            Self::Single(records) => Some(records),
            Self::Multiple(sets) => sets.first().map(Vec::as_slice),
        }
    }
}

/// Outcome of one request.
///
/// `rows == None` is the bare-count form: the request produced no result
/// set and its row count was not zero.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestResult {
    /// Row count reported by the terminal completion.
    pub row_count: Option<u64>,
    /// Row data, shaped by [`RequestOptions::multiple`](crate::RequestOptions::multiple).
    pub rows: Option<Rows>,
}

impl RequestResult {
    /// Records of the first result set, or an empty slice.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        self.rows.as_ref().and_then(Rows::first).unwrap_or(&[])
    }

    /// Take the records of the first result set.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        match self.rows {
            Some(Rows::Single(records)) => records,
            Some(Rows::Multiple(sets)) => sets.into_iter().next().unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Take every result set.
    #[must_use]
    pub fn into_result_sets(self) -> Vec<Vec<Record>> {
        match self.rows {
            Some(Rows::Single(records)) => vec![records],
            Some(Rows::Multiple(sets)) => sets,
            None => Vec::new(),
        }
    }
}

/// Incremental result builder.
///
/// Feed it events with [`push`](Self::push) and finish with
/// [`finish`](Self::finish). [`collect_result`] drives it over a stream.
#[derive(Debug, Default)]
pub struct ResultAdapter {
    columns: Option<Arc<[String]>>,
    current: Vec<Record>,
    result_sets: Vec<Vec<Record>>,
    terminal_count: Option<Option<u64>>,
    last_count: Option<Option<u64>>,
}

impl ResultAdapter {
    /// Create an empty adapter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event.
    pub fn push(&mut self, event: Event) {
        match event {
            Event::ColumnMetadata(columns) => {
                self.columns = Some(column_names(&columns));
            }
            Event::Row(values) => {
                // rows without preceding metadata get positional names
                let columns = match &self.columns {
                    Some(columns) => Arc::clone(columns),
                    None => {
                        let columns: Arc<[String]> =
                            (0..values.len()).map(|i| i.to_string()).collect();
                        self.columns = Some(Arc::clone(&columns));
                        columns
                    }
                };
                self.current.push(Record::new(columns, values));
            }
            Event::Done(done) | Event::DoneInProc(done) => {
                self.record_completion(done);
                if self.columns.as_ref().is_some_and(|c| !c.is_empty()) {
                    self.result_sets.push(std::mem::take(&mut self.current));
                    self.columns = None;
                }
            }
            Event::Completed { row_count, rows } => {
                self.record_completion(Done {
                    row_count,
                    more: false,
                });
                if let Some(rows) = rows {
                    if !rows.is_empty() || row_count == Some(0) {
                        self.result_sets.push(completed_records(rows));
                    }
                }
            }
        }
    }

    fn record_completion(&mut self, done: Done) {
        if !done.more {
            self.terminal_count = Some(done.row_count);
        }
        self.last_count = Some(done.row_count);
    }

    /// Produce the final result.
    #[must_use]
    pub fn finish(mut self, multiple: bool) -> RequestResult {
        // a trailing buffer without a completion still counts as a result set
        if self.columns.is_some() && !self.current.is_empty() {
            self.result_sets.push(std::mem::take(&mut self.current));
        }

        let row_count = self.terminal_count.or(self.last_count).flatten();

        if self.result_sets.is_empty() && row_count != Some(0) {
            return RequestResult {
                row_count,
                rows: None,
            };
        }

        let rows = if multiple {
            Some(Rows::Multiple(self.result_sets))
        } else {
            self.result_sets.into_iter().next().map(Rows::Single)
        };

        RequestResult { row_count, rows }
    }
}

fn column_names(columns: &[ColumnMetadata]) -> Arc<[String]> {
    columns.iter().map(|c| c.name.clone()).collect()
}

fn completed_records(rows: Vec<Vec<ColumnValue>>) -> Vec<Record> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let columns: Arc<[String]> = first.iter().map(|c| c.metadata.name.clone()).collect();

    rows.into_iter()
        .map(|row| {
            let values = row.into_iter().map(|c| c.value).collect();
            Record::new(Arc::clone(&columns), values)
        })
        .collect()
}

/// Drain an event stream into a [`RequestResult`].
///
/// The first `Err` item aborts collection and is returned.
pub async fn collect_result<S>(events: S, multiple: bool) -> Result<RequestResult>
where
    S: Stream<Item = Result<Event>>,
{
    futures_util::pin_mut!(events);

    let mut adapter = ResultAdapter::new();
    while let Some(event) = events.next().await {
        adapter.push(event?);
    }
    Ok(adapter.finish(multiple))
}

//! Scripted in-memory transport for tests.
//!
//! Enabled for this crate's own tests and, via the `test-util` feature, for
//! downstream crates that need a database-free [`Transport`].

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::Result;
use crate::query::QueryResult;
use crate::row::Column;
use crate::transport::Transport;
use crate::value::SqlValue;

/// One recorded statement: text plus the values bound to it.
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Statement text as sent.
    pub sql: String,
    /// Bound values, in placeholder order.
    pub params: Vec<SqlValue>,
}

/// A shared, cloneable record of every statement a [`MockTransport`] saw.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl CallLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Snapshot of just the statement texts, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.sql.clone())
            .collect()
    }

    fn record(&self, sql: &str, params: &[SqlValue]) {
        self.calls.lock().unwrap().push(MockCall {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

/// A [`Transport`] that replays scripted responses and records every call.
///
/// Unscripted queries answer `Ok(QueryResult::affected(0))`; unscripted
/// batches answer `Ok(())`.
#[derive(Debug)]
pub struct MockTransport {
    log: CallLog,
    responses: Mutex<VecDeque<Result<QueryResult>>>,
    batch_responses: Mutex<VecDeque<Result<()>>>,
    open: Arc<AtomicBool>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Create an open transport with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: CallLog::new(),
            responses: Mutex::new(VecDeque::new()),
            batch_responses: Mutex::new(VecDeque::new()),
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Record calls into a shared log instead of a private one.
    #[must_use]
    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    /// Queue the response for the next unanswered query.
    #[must_use]
    pub fn respond(self, response: Result<QueryResult>) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    /// Queue the response for the next unanswered batch.
    #[must_use]
    pub fn respond_batch(self, response: Result<()>) -> Self {
        self.batch_responses.lock().unwrap().push_back(response);
        self
    }

    /// Handle that can flip the transport to closed from outside.
    #[must_use]
    pub fn open_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.open)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        self.log.record(sql, params);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResult::affected(0)))
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        self.log.record(sql, &[]);
        self.batch_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Build a result set for scripting, inferring column types from the first
/// row.
#[must_use]
pub fn result_set(columns: &[&str], rows: Vec<Vec<SqlValue>>) -> QueryResult {
    let metadata = columns
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let type_name = rows
                .first()
                .and_then(|row| row.get(index))
                .map_or("TEXT", SqlValue::type_name);
            Column::new(*name, index, type_name)
        })
        .collect();
    QueryResult::new(metadata, rows)
}

//! Shared test connector that dials scripted in-memory transports.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use pitstop_client::Connection;
use pitstop_client::mock::{CallLog, MockTransport};
use pitstop_pool::Connect;

/// A [`Connect`] factory that counts dials and hands out mock transports.
///
/// Transports queued with [`script`](Self::script) are handed out first;
/// after that every dial gets a fresh default transport. All transports
/// share one call log.
pub struct MockConnector {
    log: CallLog,
    dials: AtomicU64,
    next_id: AtomicU64,
    scripted: Mutex<VecDeque<MockTransport>>,
    fail_dials: AtomicBool,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            log: CallLog::new(),
            dials: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            scripted: Mutex::new(VecDeque::new()),
            fail_dials: AtomicBool::new(false),
        }
    }

    /// The call log shared by every transport this connector dials.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// How many connections have been dialed.
    pub fn dials(&self) -> u64 {
        self.dials.load(Ordering::SeqCst)
    }

    /// Queue a transport for the next dial.
    #[must_use]
    pub fn script(self, transport: MockTransport) -> Self {
        self.scripted.lock().unwrap().push_back(transport);
        self
    }

    /// Make all further dials fail.
    pub fn fail_dials(&self) {
        self.fail_dials.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connect for MockConnector {
    async fn connect(&self) -> Result<Connection, pitstop_client::Error> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.fail_dials.load(Ordering::SeqCst) {
            return Err(pitstop_client::Error::Connection("dial refused".into()));
        }

        let transport = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockTransport::new)
            .with_log(self.log.clone());

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Connection::new(id, Box::new(transport)))
    }
}

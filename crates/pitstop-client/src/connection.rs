//! A single database connection and its lifecycle.

use crate::error::{Error, Result};
use crate::query::{QueryResult, RowFormat};
use crate::transport::Transport;
use crate::value::SqlValue;

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Parked and available for checkout.
    Idle,
    /// Checked out; exactly one holder may run statements.
    InUse,
    /// Unusable; will be discarded, never handed out again.
    Closed,
}

impl ConnectionState {
    /// Whether a connection in this state can be checked out.
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// A live connection: an id for logging, a lifecycle state, and the
/// transport that actually talks to the server.
pub struct Connection {
    id: u64,
    state: ConnectionState,
    transport: Box<dyn Transport>,
}

impl Connection {
    /// Wrap an established transport. Starts `Idle`.
    #[must_use]
    pub fn new(id: u64, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            state: ConnectionState::Idle,
            transport,
        }
    }

    /// Connection id, unique within the process.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether both our state machine and the transport consider the
    /// connection usable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state != ConnectionState::Closed && self.transport.is_open()
    }

    /// Transition `Idle` -> `InUse` at checkout.
    pub fn mark_in_use(&mut self) {
        if self.state == ConnectionState::Idle {
            self.state = ConnectionState::InUse;
        }
    }

    /// Transition `InUse` -> `Idle` at release.
    pub fn mark_idle(&mut self) {
        if self.state == ConnectionState::InUse {
            self.state = ConnectionState::Idle;
        }
    }

    /// Force the connection to `Closed`; it will never run another statement.
    pub fn poison(&mut self) {
        self.state = ConnectionState::Closed;
    }

    /// Run one parameterized statement.
    ///
    /// A fatal error (transport-level failure) closes the connection; a
    /// server-reported statement error leaves it usable.
    pub async fn execute(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        format: RowFormat,
    ) -> Result<QueryResult> {
        if self.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed);
        }
        match self.transport.query(sql, params).await {
            Ok(result) => Ok(result.with_format(format)),
            Err(e) => {
                if e.is_fatal() {
                    tracing::warn!(connection_id = self.id, error = %e, "connection failed");
                    self.state = ConnectionState::Closed;
                }
                Err(e)
            }
        }
    }

    /// Run statement text with no parameters and no result set.
    pub async fn batch(&mut self, sql: &str) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Err(Error::ConnectionClosed);
        }
        match self.transport.batch(sql).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_fatal() {
                    tracing::warn!(connection_id = self.id, error = %e, "connection failed");
                    self.state = ConnectionState::Closed;
                }
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

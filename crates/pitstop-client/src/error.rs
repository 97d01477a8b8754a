//! Client error types.

use thiserror::Error;

/// Errors that can occur on a single connection.
#[derive(Debug, Error)]
pub enum Error {
    /// Establishing the connection failed (transport or authentication).
    #[error("connection failed: {0}")]
    Connection(String),

    /// TLS negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The connection is closed and cannot execute statements.
    #[error("connection closed")]
    ConnectionClosed,

    /// The server rejected a statement (bad SQL, constraint violation, ...).
    #[error("query error {code}: {message}")]
    Query {
        /// SQLSTATE code reported by the server.
        code: String,
        /// Server-provided message.
        message: String,
    },

    /// Bound value count does not match the placeholders in the text.
    ///
    /// Raised locally, before any network round-trip.
    #[error("parameter count mismatch: statement expects {expected}, got {provided}")]
    ParameterCount {
        /// Highest `$n` placeholder index in the statement text.
        expected: usize,
        /// Number of values supplied.
        provided: usize,
    },

    /// A transactional batch was rolled back; wraps the statement error.
    #[error("transaction aborted: {source}")]
    TransactionAborted {
        /// The error that caused the rollback.
        #[source]
        source: Box<Error>,
    },

    /// A column value could not be read as the requested type.
    #[error("decode error: {0}")]
    Decode(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error means the connection itself is unusable.
    ///
    /// A fatal error transitions the connection to `Closed`; the pool
    /// discards it instead of returning it to the idle set. Server-reported
    /// statement failures are not fatal — the session survives them.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Tls(_) | Self::ConnectionClosed | Self::Io(_)
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

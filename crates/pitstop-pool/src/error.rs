//! Pool and executor error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the pool itself.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been drained; no further checkouts are possible.
    #[error("pool is closed")]
    PoolClosed,

    /// No connection became available within the acquire timeout.
    #[error("timed out after {0:?} waiting for a connection")]
    AcquireTimeout(Duration),

    /// Dialing a new connection failed.
    #[error("failed to establish connection: {0}")]
    Connect(#[source] pitstop_client::Error),

    /// Invalid pool configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Errors surfaced by the [`Executor`](crate::Executor): either the pool
/// could not produce a connection, or the statement itself failed.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// Checkout failed.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The statement failed on a checked-out connection.
    #[error(transparent)]
    Query(#[from] pitstop_client::Error),
}

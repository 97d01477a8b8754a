//! Bounded connection pool.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use pitstop_client::{Connection, ConnectionState};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::PoolConfig;
use crate::connect::Connect;
use crate::error::PoolError;

/// A bounded pool of database connections.
///
/// The pool reuses idle connections, dials new ones while under capacity,
/// and makes callers wait (up to the acquire timeout) when every slot is
/// checked out. Cloning is cheap; all clones share the same pool.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pitstop_client::Config;
/// use pitstop_pool::{PgConnector, Pool};
///
/// # async fn run() -> Result<(), pitstop_pool::PoolError> {
/// let config = Config::from_url("postgres://app@localhost/shopdb")
///     .map_err(pitstop_pool::PoolError::Connect)?;
/// let pool = Pool::builder()
///     .connector(Arc::new(PgConnector::new(config)))
///     .max_connections(10)
///     .build()
///     .await?;
///
/// let conn = pool.acquire().await?;
/// // run statements, then drop the guard to return the connection
/// drop(conn);
/// pool.drain().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: PoolConfig,
    connector: Arc<dyn Connect>,
    /// One permit per connection slot; holding a permit is the only way to
    /// hold a connection, so live connections never exceed capacity.
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState>,
    closed: AtomicBool,
    metrics: Metrics,
}

struct PoolState {
    idle: VecDeque<IdleConnection>,
    /// Live connections, idle plus checked out.
    total: u32,
}

struct IdleConnection {
    conn: Connection,
    parked_at: Instant,
}

#[derive(Default)]
struct Metrics {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    checkouts: AtomicU64,
    checkout_failures: AtomicU64,
    double_releases: AtomicU64,
}

/// Counters accumulated over the life of a pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolMetrics {
    /// Connections dialed.
    pub connections_created: u64,
    /// Connections discarded or drained.
    pub connections_closed: u64,
    /// Successful checkouts.
    pub checkouts: u64,
    /// Checkouts that failed (timeout, closed pool, or dial failure).
    pub checkout_failures: u64,
    /// Releases of a connection that was already idle.
    pub double_releases: u64,
}

/// Point-in-time occupancy of the pool.
#[derive(Debug, Clone, Copy)]
pub struct PoolStatus {
    /// Idle connections available for checkout.
    pub available: u32,
    /// Connections currently checked out.
    pub in_use: u32,
    /// Live connections, idle plus checked out.
    pub total: u32,
    /// Configured capacity.
    pub max: u32,
}

impl Pool {
    /// Start building a pool.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Check a connection out of the pool.
    ///
    /// Prefers an idle connection; dials a new one while under capacity;
    /// otherwise waits until a slot frees up or the acquire timeout passes.
    /// Stale idle connections (past the idle timeout, or whose transport
    /// has gone away) are discarded and replaced during the same checkout.
    pub async fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            inner.metrics.checkout_failures.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::PoolClosed);
        }

        let permit = match tokio::time::timeout(
            inner.config.acquire_timeout,
            Arc::clone(&inner.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            // semaphore closed by drain
            Ok(Err(_)) => {
                inner.metrics.checkout_failures.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::PoolClosed);
            }
            Err(_) => {
                inner.metrics.checkout_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    timeout = ?inner.config.acquire_timeout,
                    "timed out waiting for a pool slot"
                );
                return Err(PoolError::AcquireTimeout(inner.config.acquire_timeout));
            }
        };

        // A drain may have started while we waited for the permit.
        if inner.closed.load(Ordering::SeqCst) {
            inner.metrics.checkout_failures.fetch_add(1, Ordering::Relaxed);
            return Err(PoolError::PoolClosed);
        }

        // Reuse the most recently parked idle connection; discard stale ones.
        loop {
            let candidate = inner.state.lock().idle.pop_back();
            let Some(idle) = candidate else { break };

            if idle.parked_at.elapsed() >= inner.config.idle_timeout || !idle.conn.is_open() {
                inner.discard(idle.conn, "stale idle connection");
                continue;
            }

            let mut conn = idle.conn;
            conn.mark_in_use();
            inner.metrics.checkouts.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(connection_id = conn.id(), "reusing idle connection");
            return Ok(PooledConnection {
                conn: Some(conn),
                inner: Arc::clone(inner),
                _permit: permit,
            });
        }

        // Nothing idle; dial a replacement under the permit we hold.
        match inner.connector.connect().await {
            Ok(mut conn) => {
                {
                    let mut state = inner.state.lock();
                    state.total += 1;
                }
                inner
                    .metrics
                    .connections_created
                    .fetch_add(1, Ordering::Relaxed);
                conn.mark_in_use();
                inner.metrics.checkouts.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(connection_id = conn.id(), "dialed new connection");
                Ok(PooledConnection {
                    conn: Some(conn),
                    inner: Arc::clone(inner),
                    _permit: permit,
                })
            }
            Err(e) => {
                inner.metrics.checkout_failures.fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Connect(e))
            }
        }
    }

    /// Close the pool.
    ///
    /// New and pending acquires fail with [`PoolError::PoolClosed`];
    /// connections already checked out stay usable, and `drain` returns
    /// once every one of them has been released and closed.
    pub async fn drain(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("drain called on an already closed pool");
        }

        // Take every slot; outstanding guards each hold one, so this
        // completes only after the last checkout is released. Waiters queued
        // ahead of us get a permit first, observe the closed flag, and put
        // it back.
        let held = inner
            .semaphore
            .acquire_many(inner.config.max_connections)
            .await;

        let idle = std::mem::take(&mut inner.state.lock().idle);
        for parked in idle {
            inner.discard(parked.conn, "pool drained");
        }

        inner.semaphore.close();
        drop(held);

        tracing::info!("connection pool drained");
    }

    /// Whether the pool has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Idle connections currently parked.
    #[must_use]
    pub fn idle_count(&self) -> u32 {
        self.inner.state.lock().idle.len() as u32
    }

    /// Current occupancy.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        let available = state.idle.len() as u32;
        PoolStatus {
            available,
            in_use: state.total.saturating_sub(available),
            total: state.total,
            max: self.inner.config.max_connections,
        }
    }

    /// Snapshot of the lifetime counters.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let m = &self.inner.metrics;
        PoolMetrics {
            connections_created: m.connections_created.load(Ordering::Relaxed),
            connections_closed: m.connections_closed.load(Ordering::Relaxed),
            checkouts: m.checkouts.load(Ordering::Relaxed),
            checkout_failures: m.checkout_failures.load(Ordering::Relaxed),
            double_releases: m.double_releases.load(Ordering::Relaxed),
        }
    }

    /// The pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("status", &status)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl PoolInner {
    /// Return a released connection to the idle set, or discard it.
    fn checkin(&self, mut conn: Connection) {
        match conn.state() {
            ConnectionState::Idle => {
                // Released while already parked. Cannot happen through the
                // guard API, but the invariant is cheap to check.
                tracing::warn!(connection_id = conn.id(), "double release detected");
                self.metrics.double_releases.fetch_add(1, Ordering::Relaxed);
            }
            ConnectionState::InUse => conn.mark_idle(),
            ConnectionState::Closed => {
                self.discard(conn, "connection failed");
                return;
            }
        }

        if self.closed.load(Ordering::SeqCst) || !conn.is_open() {
            self.discard(conn, "connection not parkable");
            return;
        }

        tracing::trace!(connection_id = conn.id(), "returning connection to pool");
        self.state.lock().idle.push_back(IdleConnection {
            conn,
            parked_at: Instant::now(),
        });
    }

    fn discard(&self, conn: Connection, reason: &str) {
        tracing::debug!(connection_id = conn.id(), reason, "discarding connection");
        {
            let mut state = self.state.lock();
            state.total = state.total.saturating_sub(1);
        }
        self.metrics.connections_closed.fetch_add(1, Ordering::Relaxed);
        drop(conn);
    }
}

/// A connection checked out of the pool.
///
/// Dereferences to [`Connection`]. Dropping the guard returns the
/// connection to the pool on every path, including early returns and
/// panics; a connection that failed fatally is discarded instead.
pub struct PooledConnection {
    conn: Option<Connection>,
    inner: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl PooledConnection {
    /// Return the connection to the pool now.
    ///
    /// Equivalent to dropping the guard; exists to make the release point
    /// explicit at call sites.
    pub fn release(self) {}
}

impl std::ops::Deref for PooledConnection {
    type Target = Connection;

    // Invariant: `conn` is Some until Drop.
    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl std::ops::DerefMut for PooledConnection {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Park before the permit is released so the next waiter can
            // find this connection idle.
            self.inner.checkin(conn);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("connection", &self.conn)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Pool`].
pub struct PoolBuilder {
    config: PoolConfig,
    connector: Option<Arc<dyn Connect>>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolBuilder {
    /// Create a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            connector: None,
        }
    }

    /// Set the connection factory. Required.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connect>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: PoolConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.config.max_connections = max;
        self
    }

    /// Set the number of connections to dial eagerly.
    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.config.min_connections = min;
        self
    }

    /// Set the acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Set the idle timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    /// Build the pool, dialing `min_connections` eagerly.
    pub async fn build(self) -> Result<Pool, PoolError> {
        self.config.validate()?;
        let connector = self
            .connector
            .ok_or_else(|| PoolError::Configuration("a connector is required".into()))?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections as usize));
        let inner = Arc::new(PoolInner {
            connector,
            semaphore,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(self.config.max_connections as usize),
                total: 0,
            }),
            closed: AtomicBool::new(false),
            metrics: Metrics::default(),
            config: self.config,
        });

        for _ in 0..inner.config.min_connections {
            let conn = inner.connector.connect().await.map_err(PoolError::Connect)?;
            {
                let mut state = inner.state.lock();
                state.total += 1;
                state.idle.push_back(IdleConnection {
                    conn,
                    parked_at: Instant::now(),
                });
            }
            inner
                .metrics
                .connections_created
                .fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            max_connections = inner.config.max_connections,
            min_connections = inner.config.min_connections,
            "connection pool created"
        );
        Ok(Pool { inner })
    }
}

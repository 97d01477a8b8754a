//! Pool lifecycle tests against scripted in-memory connections.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::MockConnector;
use pitstop_client::mock::MockTransport;
use pitstop_pool::{Pool, PoolError};

async fn pool_with(connector: MockConnector, max: u32) -> Pool {
    Pool::builder()
        .connector(Arc::new(connector))
        .max_connections(max)
        .build()
        .await
        .unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn create_and_drain() {
    let connector = Arc::new(MockConnector::new());
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(4)
        .build()
        .await
        .unwrap();

    assert!(!pool.is_closed());
    assert_eq!(pool.status().total, 0);

    pool.drain().await;
    assert!(pool.is_closed());

    // no checkout after drain, and nothing gets dialed for it
    let err = pool.acquire().await;
    assert!(matches!(err, Err(PoolError::PoolClosed)));
    assert_eq!(connector.dials(), 0);
}

#[tokio::test]
async fn min_connections_are_dialed_eagerly() {
    let connector = Arc::new(MockConnector::new());
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(5)
        .min_connections(2)
        .build()
        .await
        .unwrap();

    assert_eq!(connector.dials(), 2);
    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.status().total, 2);
    pool.drain().await;
}

#[tokio::test]
async fn builder_requires_a_connector() {
    let result = Pool::builder().max_connections(1).build().await;
    assert!(matches!(result, Err(PoolError::Configuration(_))));
}

// =============================================================================
// Checkout and release
// =============================================================================

#[tokio::test]
async fn release_restores_the_idle_set() {
    let pool = pool_with(MockConnector::new(), 2).await;

    let conn = pool.acquire().await.unwrap();
    let status = pool.status();
    assert_eq!(status.in_use, 1);
    assert_eq!(status.available, 0);

    conn.release();
    let status = pool.status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.available, 1);
    assert_eq!(status.total, 1);
}

#[tokio::test]
async fn idle_connections_are_reused() {
    let connector = Arc::new(MockConnector::new());
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(4)
        .build()
        .await
        .unwrap();

    let first = pool.acquire().await.unwrap();
    let id = first.id();
    drop(first);

    let second = pool.acquire().await.unwrap();
    assert_eq!(second.id(), id);
    assert_eq!(connector.dials(), 1);

    let metrics = pool.metrics();
    assert_eq!(metrics.checkouts, 2);
    assert_eq!(metrics.connections_created, 1);
}

#[tokio::test]
async fn dial_failure_surfaces_and_frees_the_slot() {
    let connector = Arc::new(MockConnector::new());
    connector.fail_dials();
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(100))
        .build()
        .await
        .unwrap();

    let err = pool.acquire().await;
    assert!(matches!(err, Err(PoolError::Connect(_))));

    // the failed dial did not leak its capacity slot
    let err = pool.acquire().await;
    assert!(matches!(err, Err(PoolError::Connect(_))));
    assert_eq!(pool.metrics().checkout_failures, 2);
}

// =============================================================================
// Capacity
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_is_never_exceeded() {
    let connector = Arc::new(MockConnector::new());
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(3)
        .build()
        .await
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
            drop(conn);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let metrics = pool.metrics();
    assert_eq!(metrics.checkouts, 20);
    assert!(metrics.connections_created <= 3);
    assert!(pool.status().total <= 3);
}

#[tokio::test]
async fn acquire_times_out_when_saturated() {
    let pool = {
        let connector = MockConnector::new();
        Pool::builder()
            .connector(Arc::new(connector))
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(50))
            .build()
            .await
            .unwrap()
    };

    let held = pool.acquire().await.unwrap();
    let err = pool.acquire().await;
    assert!(matches!(err, Err(PoolError::AcquireTimeout(_))));

    drop(held);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn drain_wakes_pending_waiters() {
    let pool = pool_with(MockConnector::new(), 1).await;

    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let drainer = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.drain().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(held);

    let waited = waiter.await.unwrap();
    assert!(matches!(waited, Err(PoolError::PoolClosed)));
    drainer.await.unwrap();
    assert!(pool.is_closed());
    assert_eq!(pool.idle_count(), 0);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn broken_connection_is_discarded_and_replaced() {
    let transport = MockTransport::new();
    let open = transport.open_handle();
    let connector = Arc::new(MockConnector::new().script(transport));
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(2)
        .build()
        .await
        .unwrap();

    let conn = pool.acquire().await.unwrap();
    open.store(false, std::sync::atomic::Ordering::SeqCst);
    drop(conn);

    // the dead connection never reaches the idle set
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.metrics().connections_closed, 1);

    let replacement = pool.acquire().await.unwrap();
    assert!(replacement.is_open());
    assert_eq!(connector.dials(), 2);
}

#[tokio::test]
async fn expired_idle_connection_is_replaced_at_checkout() {
    let connector = Arc::new(MockConnector::new());
    let pool = Pool::builder()
        .connector(Arc::clone(&connector) as Arc<dyn pitstop_pool::Connect>)
        .max_connections(2)
        .idle_timeout(Duration::from_millis(10))
        .build()
        .await
        .unwrap();

    drop(pool.acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;

    let conn = pool.acquire().await.unwrap();
    assert!(conn.is_open());
    assert_eq!(connector.dials(), 2);
    assert_eq!(pool.metrics().connections_closed, 1);
}

#[tokio::test]
async fn double_release_is_detected_and_counted() {
    let pool = pool_with(MockConnector::new(), 2).await;

    let mut conn = pool.acquire().await.unwrap();
    // force the connection back to idle while still checked out
    conn.mark_idle();
    drop(conn);

    assert_eq!(pool.metrics().double_releases, 1);
    // the connection is still parked and usable
    assert_eq!(pool.idle_count(), 1);
}

//! Executor tests: binding, validation, and transaction control.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::sync::Arc;

use common::MockConnector;
use pitstop_client::mock::{MockTransport, result_set};
use pitstop_client::{Error, QueryRequest, RowFormat, SqlValue, params};
use pitstop_pool::{ExecuteError, Executor, Pool};

async fn executor_with(connector: Arc<MockConnector>) -> Executor {
    let pool = Pool::builder()
        .connector(connector as Arc<dyn pitstop_pool::Connect>)
        .max_connections(2)
        .build()
        .await
        .unwrap();
    Executor::new(pool)
}

// =============================================================================
// Single statements
// =============================================================================

#[tokio::test]
async fn runs_a_statement_and_returns_rows() {
    let connector = Arc::new(MockConnector::new().script(
        MockTransport::new().respond(Ok(result_set(
            &["id", "city"],
            vec![vec![SqlValue::Int4(1), SqlValue::Text("Ames".into())]],
        ))),
    ));
    let executor = executor_with(Arc::clone(&connector)).await;

    let result = executor
        .execute(QueryRequest::new("select id, city from shop"))
        .await
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert_eq!(result.first().unwrap().try_get::<i32>(0).unwrap(), 1);
}

#[tokio::test]
async fn values_bind_positionally_not_textually() {
    let connector = Arc::new(MockConnector::new());
    let executor = executor_with(Arc::clone(&connector)).await;

    executor
        .execute(
            QueryRequest::new("select * from shop where shop_number = $1").values(params![42]),
        )
        .await
        .unwrap();

    let calls = connector.log().calls();
    assert_eq!(calls.len(), 1);
    // the statement text keeps its placeholder; the value travels separately
    assert!(calls[0].sql.contains("$1"));
    assert!(!calls[0].sql.contains("42"));
    assert_eq!(calls[0].params, vec![SqlValue::Int4(42)]);
}

#[tokio::test]
async fn parameter_mismatch_fails_before_checkout() {
    let connector = Arc::new(MockConnector::new());
    let executor = executor_with(Arc::clone(&connector)).await;

    let err = executor
        .execute(QueryRequest::new("insert into t values ($1, $2)").bind(1))
        .await;

    assert!(matches!(
        err,
        Err(ExecuteError::Query(Error::ParameterCount {
            expected: 2,
            provided: 1
        }))
    ));
    // nothing was dialed and nothing reached a transport
    assert_eq!(connector.dials(), 0);
    assert!(connector.log().is_empty());
}

#[tokio::test]
async fn statement_error_still_releases_the_connection() {
    let connector = Arc::new(MockConnector::new().script(
        MockTransport::new().respond(Err(Error::Query {
            code: "42601".into(),
            message: "syntax error".into(),
        })),
    ));
    let executor = executor_with(Arc::clone(&connector)).await;

    let err = executor.execute(QueryRequest::new("selct 1")).await;
    assert!(matches!(err, Err(ExecuteError::Query(Error::Query { .. }))));

    // the connection survived the statement failure and is parked again
    assert_eq!(executor.pool().idle_count(), 1);
    executor.execute(QueryRequest::new("select 1")).await.unwrap();
    assert_eq!(connector.dials(), 1);
}

#[tokio::test]
async fn array_row_format_shapes_the_payload() {
    let connector = Arc::new(MockConnector::new().script(
        MockTransport::new().respond(Ok(result_set(
            &["id", "city"],
            vec![vec![SqlValue::Int4(1), SqlValue::Text("Ames".into())]],
        ))),
    ));
    let executor = executor_with(connector).await;

    let result = executor
        .execute(QueryRequest::new("select id, city from shop").row_format(RowFormat::Arrays))
        .await
        .unwrap();
    assert_eq!(result.into_payload(), serde_json::json!([[1, "Ames"]]));
}

// =============================================================================
// Transactions
// =============================================================================

#[tokio::test]
async fn transaction_commits_in_order_on_one_connection() {
    let connector = Arc::new(MockConnector::new());
    let executor = executor_with(Arc::clone(&connector)).await;

    executor
        .execute_transaction(vec![
            QueryRequest::new("delete from address where shop_id = $1").bind(4),
            QueryRequest::new("update shop set city = $1 where id = $2")
                .bind("Ames")
                .bind(4),
        ])
        .await
        .unwrap();

    assert_eq!(
        connector.log().statements(),
        vec![
            "BEGIN".to_string(),
            "delete from address where shop_id = $1".to_string(),
            "update shop set city = $1 where id = $2".to_string(),
            "COMMIT".to_string(),
        ]
    );
    assert_eq!(connector.dials(), 1);
}

#[tokio::test]
async fn failed_statement_rolls_back_and_reraises() {
    let connector = Arc::new(MockConnector::new().script(
        MockTransport::new()
            .respond(Ok(result_set(&[], vec![])))
            .respond(Err(Error::Query {
                code: "23503".into(),
                message: "violates foreign key".into(),
            })),
    ));
    let executor = executor_with(Arc::clone(&connector)).await;

    let err = executor
        .execute_transaction(vec![
            QueryRequest::new("delete from address where shop_id = $1").bind(4),
            QueryRequest::new("delete from shop where id = $1").bind(4),
        ])
        .await;

    match err {
        Err(ExecuteError::Query(Error::TransactionAborted { source })) => {
            assert!(matches!(*source, Error::Query { ref code, .. } if code == "23503"));
        }
        other => panic!("expected TransactionAborted, got {other:?}"),
    }

    assert_eq!(
        connector.log().statements(),
        vec![
            "BEGIN".to_string(),
            "delete from address where shop_id = $1".to_string(),
            "delete from shop where id = $1".to_string(),
            "ROLLBACK".to_string(),
        ]
    );
    // the rolled-back connection is parked again, not discarded
    assert_eq!(executor.pool().idle_count(), 1);
}

#[tokio::test]
async fn transaction_validates_every_request_up_front() {
    let connector = Arc::new(MockConnector::new());
    let executor = executor_with(Arc::clone(&connector)).await;

    let err = executor
        .execute_transaction(vec![
            QueryRequest::new("delete from address where shop_id = $1").bind(4),
            QueryRequest::new("delete from shop where id = $1"),
        ])
        .await;

    assert!(matches!(
        err,
        Err(ExecuteError::Query(Error::ParameterCount { .. }))
    ));
    // not even BEGIN was sent
    assert!(connector.log().is_empty());
    assert_eq!(connector.dials(), 0);
}

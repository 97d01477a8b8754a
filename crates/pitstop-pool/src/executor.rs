//! Query execution over pooled connections.

use pitstop_client::{Connection, Error, QueryRequest, QueryResult, Transaction};

use crate::error::ExecuteError;
use crate::pool::Pool;

/// Runs statements on connections checked out of a [`Pool`].
///
/// Every call validates its request locally, borrows a connection for
/// exactly the duration of the statement(s), and returns it on all paths.
///
/// # Example
///
/// ```no_run
/// use pitstop_client::{QueryRequest, params};
/// use pitstop_pool::Executor;
///
/// # async fn run(pool: pitstop_pool::Pool) -> Result<(), pitstop_pool::ExecuteError> {
/// let executor = Executor::new(pool);
/// let result = executor
///     .execute(QueryRequest::new("select * from shop where id = $1").values(params![7]))
///     .await?;
/// println!("{} rows", result.row_count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Executor {
    pool: Pool,
}

impl Executor {
    /// Create an executor over a pool.
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run one statement on a pooled connection.
    ///
    /// The request is validated before a connection is checked out; a
    /// parameter-count mismatch costs no pool slot and no network round
    /// trip.
    pub async fn execute(&self, request: QueryRequest) -> Result<QueryResult, ExecuteError> {
        request.validate()?;

        let mut conn = self.pool.acquire().await?;
        let result = conn
            .execute(request.text(), request.params(), request.format())
            .await?;
        drop(conn);

        tracing::info!(
            rows = result.row_count(),
            idle = self.pool.idle_count(),
            "statement completed"
        );
        Ok(result)
    }

    /// Run several statements atomically on one pooled connection.
    ///
    /// All requests are validated up front. On the first failure the
    /// transaction is rolled back and the statement's error is re-raised,
    /// wrapped in [`Error::TransactionAborted`].
    pub async fn execute_transaction(
        &self,
        requests: Vec<QueryRequest>,
    ) -> Result<Vec<QueryResult>, ExecuteError> {
        for request in &requests {
            request.validate()?;
        }

        let mut conn = self.pool.acquire().await?;
        let results = Self::run_transaction(&mut conn, &requests).await?;
        drop(conn);

        tracing::info!(
            statements = requests.len(),
            idle = self.pool.idle_count(),
            "transaction committed"
        );
        Ok(results)
    }

    async fn run_transaction(
        conn: &mut Connection,
        requests: &[QueryRequest],
    ) -> Result<Vec<QueryResult>, Error> {
        let mut tx = Transaction::begin(conn).await?;
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            match tx.execute(request).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!(error = %e, "statement failed; rolling back");
                    if let Err(rollback_err) = tx.rollback().await {
                        tracing::warn!(error = %rollback_err, "rollback failed");
                    }
                    return Err(Error::TransactionAborted {
                        source: Box::new(e),
                    });
                }
            }
        }

        tx.commit().await?;
        Ok(results)
    }
}

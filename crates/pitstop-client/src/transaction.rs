//! Explicit transactions over a borrowed connection.

use crate::connection::Connection;
use crate::error::Result;
use crate::query::{QueryRequest, QueryResult};

/// An open transaction.
///
/// Must be resolved by [`commit`](Self::commit) or
/// [`rollback`](Self::rollback). Dropping an unresolved transaction poisons
/// the connection so in-transaction session state cannot leak to the next
/// checkout.
#[derive(Debug)]
pub struct Transaction<'a> {
    conn: &'a mut Connection,
    resolved: bool,
}

impl<'a> Transaction<'a> {
    /// Open a transaction on the connection.
    pub async fn begin(conn: &'a mut Connection) -> Result<Transaction<'a>> {
        conn.batch("BEGIN").await?;
        tracing::debug!(connection_id = conn.id(), "transaction started");
        Ok(Self {
            conn,
            resolved: false,
        })
    }

    /// Run one statement inside the transaction.
    pub async fn execute(&mut self, request: &QueryRequest) -> Result<QueryResult> {
        request.validate()?;
        self.conn
            .execute(request.text(), request.params(), request.format())
            .await
    }

    /// Commit the transaction.
    pub async fn commit(mut self) -> Result<()> {
        self.conn.batch("COMMIT").await?;
        self.resolved = true;
        tracing::debug!(connection_id = self.conn.id(), "transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    ///
    /// If the `ROLLBACK` itself fails the connection is left unresolved and
    /// the drop guard poisons it.
    pub async fn rollback(mut self) -> Result<()> {
        let result = self.conn.batch("ROLLBACK").await;
        self.resolved = result.is_ok();
        match &result {
            Ok(()) => tracing::debug!(connection_id = self.conn.id(), "transaction rolled back"),
            Err(e) => {
                tracing::warn!(connection_id = self.conn.id(), error = %e, "rollback failed");
            }
        }
        result
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            tracing::warn!(
                connection_id = self.conn.id(),
                "transaction dropped without commit or rollback; closing connection"
            );
            self.conn.poison();
        }
    }
}

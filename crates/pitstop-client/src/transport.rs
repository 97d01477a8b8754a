//! The transport contract between connections and the wire driver.

use async_trait::async_trait;

use crate::error::Result;
use crate::query::QueryResult;
use crate::value::SqlValue;

mod pg;

pub use pg::{PgTransport, connect};

/// A duplex channel that can run statements against a database server.
///
/// [`Connection`](crate::Connection) owns a boxed transport and never looks
/// inside it; anything that can bind positional parameters and return rows
/// satisfies the contract, which is what makes scripted test transports
/// possible.
#[async_trait]
pub trait Transport: Send {
    /// Run one parameterized statement and collect its result.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult>;

    /// Run statement text with no parameters and no result set.
    ///
    /// Used for transaction control (`BEGIN`, `COMMIT`, `ROLLBACK`).
    async fn batch(&mut self, sql: &str) -> Result<()>;

    /// Whether the underlying channel is still usable.
    fn is_open(&self) -> bool;
}

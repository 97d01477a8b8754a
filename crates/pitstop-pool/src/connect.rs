//! Connection factories.

use async_trait::async_trait;
use pitstop_client::{Config, Connection};

/// Dials new connections on the pool's behalf.
///
/// The pool never knows how connections come to exist; tests supply
/// factories that hand out scripted transports.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Establish one new connection.
    async fn connect(&self) -> Result<Connection, pitstop_client::Error>;
}

/// The production factory: dials Postgres using a fixed [`Config`].
#[derive(Debug, Clone)]
pub struct PgConnector {
    config: Config,
}

impl PgConnector {
    /// Create a factory for the given connection configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// The connection configuration this factory dials with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl Connect for PgConnector {
    async fn connect(&self) -> Result<Connection, pitstop_client::Error> {
        pitstop_client::connect(&self.config).await
    }
}

//! Environment-sourced server configuration.

use anyhow::Context;
use pitstop_client::{Config, TlsMode};

/// Runtime configuration, read from the environment.
///
/// | Variable               | Meaning                               | Default     |
/// |------------------------|---------------------------------------|-------------|
/// | `DATABASE_URL`         | `postgres://` connection URL          | required    |
/// | `DATABASE_TLS`         | `disable` / `no-verify` / `verify`    | `no-verify` |
/// | `PORT`                 | HTTP listen port                      | `8000`      |
/// | `POOL_MAX_CONNECTIONS` | pool capacity                         | `10`        |
///
/// `DATABASE_TLS` overrides any `sslmode` in the URL; when neither is given
/// the service encrypts without certificate verification, which is what the
/// managed-hosting setups it targets require.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database connection settings.
    pub database: Config,
    /// HTTP listen port.
    pub port: u16,
    /// Pool capacity.
    pub pool_max: u32,
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let mut database = Config::from_url(&url).context("invalid DATABASE_URL")?;

        match std::env::var("DATABASE_TLS") {
            Ok(mode) => {
                database.tls = match mode.as_str() {
                    "disable" => TlsMode::Disable,
                    "no-verify" => TlsMode::NoVerify,
                    "verify" => TlsMode::VerifyFull,
                    other => anyhow::bail!("unrecognized DATABASE_TLS value: {other}"),
                };
            }
            Err(_) => {
                if !url.contains("sslmode=") {
                    database.tls = TlsMode::NoVerify;
                }
            }
        }

        let port = match std::env::var("PORT") {
            Ok(value) => value.parse().context("invalid PORT")?,
            Err(_) => 8000,
        };

        let pool_max = match std::env::var("POOL_MAX_CONNECTIONS") {
            Ok(value) => value.parse().context("invalid POOL_MAX_CONNECTIONS")?,
            Err(_) => 10,
        };

        Ok(Self {
            database,
            port,
            pool_max,
        })
    }
}

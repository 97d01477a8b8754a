//! Postgres transport over tokio-postgres, with rustls for TLS.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::task::JoinHandle;
use tokio_postgres::NoTls;
use tokio_postgres::config::SslMode;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres_rustls::MakeRustlsConnect;
use uuid::Uuid;

use crate::config::{Config, TlsMode};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::query::QueryResult;
use crate::row::Column;
use crate::transport::Transport;
use crate::value::SqlValue;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Certificate verification
// =============================================================================

/// A certificate verifier that accepts any server certificate.
///
/// **WARNING:** This is insecure and should only be used for development or
/// behind network-level trust. Connections are vulnerable to
/// man-in-the-middle attacks.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

fn rustls_config(tls: &TlsMode) -> Result<ClientConfig> {
    match tls {
        TlsMode::Disable => Err(Error::Tls(
            "TLS client config requested with TLS disabled".into(),
        )),
        TlsMode::NoVerify => {
            tracing::warn!(
                "certificate validation is DISABLED; connections are vulnerable \
                 to man-in-the-middle attacks"
            );
            Ok(ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth())
        }
        TlsMode::VerifyFull => {
            let root_store = RootCertStore {
                roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
            };
            Ok(ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth())
        }
    }
}

// =============================================================================
// Connecting
// =============================================================================

/// Establish a connection to the server described by `config`.
///
/// The driver's read/write loop runs on a spawned task for the life of the
/// connection; dropping the returned [`Connection`] aborts it.
pub async fn connect(config: &Config) -> Result<Connection> {
    config.validate()?;

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&config.host)
        .port(config.port)
        .user(&config.user)
        .dbname(&config.dbname)
        .application_name(&config.application_name)
        .connect_timeout(config.connect_timeout)
        .ssl_mode(match config.tls {
            TlsMode::Disable => SslMode::Disable,
            TlsMode::NoVerify | TlsMode::VerifyFull => SslMode::Require,
        });
    if let Some(password) = &config.password {
        pg_config.password(password);
    }

    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(
        connection_id = id,
        host = %config.host,
        port = config.port,
        dbname = %config.dbname,
        tls = ?config.tls,
        "connecting"
    );

    let (client, driver) = match config.tls {
        TlsMode::Disable => {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            let driver = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::debug!(connection_id = id, error = %e, "driver task ended");
                }
            });
            (client, driver)
        }
        TlsMode::NoVerify | TlsMode::VerifyFull => {
            let tls = MakeRustlsConnect::new(rustls_config(&config.tls)?);
            let (client, connection) = pg_config
                .connect(tls)
                .await
                .map_err(|e| Error::Connection(e.to_string()))?;
            let driver = tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::debug!(connection_id = id, error = %e, "driver task ended");
                }
            });
            (client, driver)
        }
    };

    tracing::debug!(connection_id = id, "connected");
    Ok(Connection::new(id, Box::new(PgTransport { client, driver })))
}

// =============================================================================
// Transport implementation
// =============================================================================

/// [`Transport`] backed by a tokio-postgres client.
pub struct PgTransport {
    client: tokio_postgres::Client,
    driver: JoinHandle<()>,
}

#[async_trait]
impl Transport for PgTransport {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<QueryResult> {
        let statement = self
            .client
            .prepare(sql)
            .await
            .map_err(map_pg_error)?;

        let bound: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        if statement.columns().is_empty() {
            let affected = self
                .client
                .execute(&statement, &bound)
                .await
                .map_err(map_pg_error)?;
            return Ok(QueryResult::affected(affected));
        }

        let columns: Vec<Column> = statement
            .columns()
            .iter()
            .enumerate()
            .map(|(index, col)| {
                Column::new(col.name(), index, col.type_().name().to_uppercase())
            })
            .collect();

        let pg_rows = self
            .client
            .query(&statement, &bound)
            .await
            .map_err(map_pg_error)?;

        let mut rows = Vec::with_capacity(pg_rows.len());
        for pg_row in &pg_rows {
            let mut values = Vec::with_capacity(columns.len());
            for (index, col) in pg_row.columns().iter().enumerate() {
                values.push(decode_cell(pg_row, index, col.type_())?);
            }
            rows.push(values);
        }

        Ok(QueryResult::new(columns, rows))
    }

    async fn batch(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await.map_err(map_pg_error)
    }

    fn is_open(&self) -> bool {
        !self.client.is_closed()
    }
}

impl Drop for PgTransport {
    fn drop(&mut self) {
        // Dropping the client closes the socket; the driver task would then
        // exit on its own, but aborting it is immediate.
        self.driver.abort();
    }
}

impl std::fmt::Debug for PgTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransport")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

fn map_pg_error(error: tokio_postgres::Error) -> Error {
    if let Some(db) = error.as_db_error() {
        return Error::Query {
            code: db.code().code().to_string(),
            message: db.message().to_string(),
        };
    }
    if error.is_closed() {
        return Error::ConnectionClosed;
    }
    Error::Connection(error.to_string())
}

fn decode_cell(row: &tokio_postgres::Row, index: usize, ty: &Type) -> Result<SqlValue> {
    macro_rules! take {
        ($rust:ty, $variant:expr) => {
            row.try_get::<_, Option<$rust>>(index)
                .map_err(|e| Error::Decode(e.to_string()))?
                .map_or(SqlValue::Null, $variant)
        };
    }

    let value = match ty.name() {
        "bool" => take!(bool, SqlValue::Bool),
        "int2" => take!(i16, SqlValue::Int2),
        "int4" => take!(i32, SqlValue::Int4),
        "int8" => take!(i64, SqlValue::Int8),
        "float4" => take!(f32, SqlValue::Float4),
        "float8" => take!(f64, SqlValue::Float8),
        "text" | "varchar" | "bpchar" | "name" => take!(String, SqlValue::Text),
        "uuid" => take!(Uuid, SqlValue::Uuid),
        "numeric" => take!(rust_decimal::Decimal, SqlValue::Numeric),
        "date" => take!(chrono::NaiveDate, SqlValue::Date),
        "timestamp" => take!(chrono::NaiveDateTime, SqlValue::Timestamp),
        "timestamptz" => take!(chrono::DateTime<chrono::Utc>, SqlValue::TimestampTz),
        "json" | "jsonb" => take!(serde_json::Value, SqlValue::Json),
        "bytea" => take!(Vec<u8>, SqlValue::Bytes),
        // Anything else is read through its text representation.
        _ => take!(String, SqlValue::Text),
    };
    Ok(value)
}

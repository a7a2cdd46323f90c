use secrecy::ExposeSecret;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{Connection, PgConnection};
use tracing::debug;

use pgvault_core::ConnectionSettings;

use crate::error::ConnectionError;

const APPLICATION_NAME: &str = "pgvault";

fn parse_ssl_mode(mode: &str) -> Result<PgSslMode, ConnectionError> {
    match mode {
        "disable" => Ok(PgSslMode::Disable),
        "allow" => Ok(PgSslMode::Allow),
        "prefer" => Ok(PgSslMode::Prefer),
        "require" => Ok(PgSslMode::Require),
        "verify-ca" => Ok(PgSslMode::VerifyCa),
        "verify-full" => Ok(PgSslMode::VerifyFull),
        other => Err(ConnectionError::UnknownSslMode(other.to_owned())),
    }
}

/// Build `PgConnectOptions` for a tenant database.
pub fn connect_options(settings: &ConnectionSettings) -> Result<PgConnectOptions, ConnectionError> {
    let ssl_mode = parse_ssl_mode(settings.ssl_mode_or_default())?;
    Ok(PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(settings.password.expose_secret())
        .database(&settings.database)
        .ssl_mode(ssl_mode)
        .application_name(APPLICATION_NAME))
}

/// Open a single connection to a tenant database.
///
/// Connections are short-lived: one per watermark check or update, and one
/// held for the whole of a restore transaction.
pub async fn connect(settings: &ConnectionSettings) -> Result<PgConnection, ConnectionError> {
    let options = connect_options(settings)?;
    debug!(host = %settings.host, port = settings.port, database = %settings.database, "connecting");
    PgConnection::connect_with(&options)
        .await
        .map_err(|e| ConnectionError::Connect {
            host: settings.host.clone(),
            port: settings.port,
            database: settings.database.clone(),
            message: e.to_string(),
        })
}

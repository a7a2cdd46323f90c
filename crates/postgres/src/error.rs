use pgvault_core::{CoreError, SchemaMismatch};
use thiserror::Error;

/// Failure to open a connection to a tenant database.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("unknown ssl_mode: {0}")]
    UnknownSslMode(String),

    #[error("failed to connect to {host}:{port}/{database}: {message}")]
    Connect {
        host: String,
        port: u16,
        database: String,
        message: String,
    },
}

/// Errors from reading or recording the change gate watermarks.
///
/// Callers treat read failures as "watermarks absent" and write failures as
/// warnings; neither aborts a backup.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("watermark query failed: {0}")]
    Query(String),

    /// The metadata row the watermarks live in does not exist.
    #[error("metadata row not found in {0}")]
    MissingRow(String),
}

/// Failure to take or poll a tenant lease.
#[derive(Debug, Error)]
pub enum LeaseError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("advisory lock query failed: {0}")]
    Query(String),
}

/// Errors that abort a restore. Every one of them leaves the database as it
/// was before the restore started.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error("table {0} does not exist in the live database")]
    MissingTable(String),

    /// A strict restore met a dump column the live table does not have.
    #[error("column {column} of {table} does not exist in the live database")]
    MissingColumn { table: String, column: String },

    #[error("restore transaction failed: {0}")]
    Transaction(String),

    #[error(transparent)]
    State(#[from] CoreError),
}

impl RestoreError {
    pub(crate) fn transaction(context: &str, e: &sqlx::Error) -> Self {
        Self::Transaction(format!("{context}: {e}"))
    }
}

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use pgvault_core::CoreError;
use pgvault_dump::DumpError;
use pgvault_postgres::{LeaseError, RestoreError};
use pgvault_retention::RetentionError;
use pgvault_store::StoreError;

use crate::auth::AuthError;

/// Errors that stop the server or a CLI command before any request runs.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. reading the config file or binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A one-shot CLI operation failed.
    #[error(transparent)]
    Operation(#[from] ApiError),
}

/// Errors surfaced by the HTTP API, rendered as `{"error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("unknown database: {0}")]
    UnknownTenant(String),

    #[error("{0}")]
    BadRequest(String),

    /// Another backup or restore holds the tenant.
    #[error("another operation is running on {0}, try again later")]
    Busy(String),

    #[error(transparent)]
    Config(CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    /// The tenant database could not be reached to take the tenant lease.
    #[error("cannot lock tenant: {0}")]
    Lease(#[from] LeaseError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MissingFolder { .. } => Self::Config(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<RetentionError> for ApiError {
    fn from(e: RetentionError) -> Self {
        match e {
            RetentionError::Store(e) => Self::Store(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(e) => e.status(),
            Self::UnknownTenant(_) | Self::Config(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Busy(_) => StatusCode::CONFLICT,
            Self::Store(e) => match e {
                StoreError::FolderNotFound(_) | StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::AccessDenied(_) => StatusCode::FORBIDDEN,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Dump(_) | Self::Restore(_) | Self::Lease(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

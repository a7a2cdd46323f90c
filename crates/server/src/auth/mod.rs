pub mod extract;
pub mod jwt;
pub mod role;

use axum::http::StatusCode;
use thiserror::Error;

pub use self::extract::TenantCaller;
pub use self::jwt::{AppMetadata, Caller, Claims, JwtVerifier};
pub use self::role::Role;

/// Why a request was refused before reaching its handler.
///
/// Messages are fixed so that no token content leaks into responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    /// The token is valid but its role may not manage backups.
    #[error("Forbidden")]
    Forbidden,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::Expired | Self::Invalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

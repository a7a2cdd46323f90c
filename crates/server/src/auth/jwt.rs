use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AuthError;
use super::role::Role;

/// Claims read from bearer tokens. `aud` and `exp` are checked by the
/// validator.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    /// Expiry (seconds since epoch).
    pub exp: u64,
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// The authenticated principal of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: Option<String>,
    pub role: Role,
}

impl Caller {
    /// Used when auth is disabled.
    pub fn anonymous() -> Self {
        Self {
            subject: None,
            role: Role::Admin,
        }
    }
}

/// Validates HS256 bearer tokens against a shared secret.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    allowed_roles: Vec<Role>,
    leeway_seconds: u64,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString, allowed_roles: Vec<Role>, leeway_seconds: u64) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            allowed_roles,
            leeway_seconds,
        }
    }

    /// Check the token signature, expiry and audience, then the role.
    pub fn verify(&self, token: &str, audience: &str) -> Result<Caller, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.leeway = self.leeway_seconds;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => {
                    debug!("token expired");
                    AuthError::Expired
                }
                _ => {
                    warn!(error = %e, "invalid token");
                    AuthError::Invalid
                }
            })?
            .claims;

        let Some(role) = claims
            .app_metadata
            .role
            .as_deref()
            .and_then(Role::from_claim)
            .filter(|role| self.allowed_roles.contains(role))
        else {
            warn!(role = ?claims.app_metadata.role, "forbidden role");
            return Err(AuthError::Forbidden);
        };

        Ok(Caller {
            subject: claims.sub,
            role,
        })
    }
}

use secrecy::SecretString;
use serde::Deserialize;

use crate::auth::Role;
use crate::error::ServerError;

/// Bearer token verification settings.
///
/// Tokens are HS256 JWTs whose `aud` claim must match the audience of the
/// tenant named in the request path, and whose `app_metadata.role` must be
/// one of `allowed_roles`.
///
/// # Example
///
/// ```toml
/// [auth]
/// jwt_secret_env = "JWT_SECRET"
/// allowed_roles = ["admin", "dev"]
/// ```
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// When `false`, every request is treated as an admin caller.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Shared HMAC secret. Takes precedence over `jwt_secret_env`.
    #[serde(default)]
    pub jwt_secret: Option<SecretString>,
    /// Environment variable holding the shared secret.
    #[serde(default = "default_secret_env")]
    pub jwt_secret_env: String,
    /// Roles allowed to back up, list and restore.
    #[serde(default = "default_allowed_roles")]
    pub allowed_roles: Vec<Role>,
    /// Clock skew tolerated when checking `exp`, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            jwt_secret: None,
            jwt_secret_env: default_secret_env(),
            allowed_roles: default_allowed_roles(),
            leeway_seconds: default_leeway(),
        }
    }
}

impl AuthConfig {
    /// Resolve the shared secret from the file or the environment.
    pub fn secret(&self) -> Result<SecretString, ServerError> {
        if let Some(secret) = &self.jwt_secret {
            return Ok(secret.clone());
        }
        std::env::var(&self.jwt_secret_env)
            .map(SecretString::new)
            .map_err(|_| {
                ServerError::Config(format!(
                    "auth is enabled but neither auth.jwt_secret nor ${} is set",
                    self.jwt_secret_env
                ))
            })
    }
}

fn default_enabled() -> bool {
    true
}

fn default_secret_env() -> String {
    "JWT_SECRET".to_owned()
}

fn default_allowed_roles() -> Vec<Role> {
    vec![Role::Admin, Role::Dev]
}

fn default_leeway() -> u64 {
    30
}

mod auth;
mod backup;
mod retention;
mod scheduler;
mod server;
mod storage;
mod telemetry;
mod tenants;

#[cfg(test)]
mod tests;

pub use auth::*;
pub use backup::*;
pub use retention::*;
pub use scheduler::*;
pub use server::*;
pub use storage::*;
pub use telemetry::*;
pub use tenants::*;

use std::path::Path;

use serde::Deserialize;

use crate::error::ServerError;

/// Top-level configuration for the pgvault server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct PgvaultConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Bearer token verification.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Dump production and operation timeouts.
    #[serde(default)]
    pub backup: BackupConfig,
    /// Remote artifact storage.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Rotation of old artifacts after each upload.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Periodic backups of every tenant.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// OpenTelemetry distributed tracing configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Logical databases managed by this server.
    #[serde(default)]
    pub tenants: Vec<TenantEntry>,
}

impl PgvaultConfig {
    /// Read the configuration at `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ServerError> {
        toml::from_str(contents).map_err(|e| ServerError::Config(e.to_string()))
    }
}

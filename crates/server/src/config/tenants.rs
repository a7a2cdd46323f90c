use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ServerError;

/// One `[[tenants]]` entry as written in the configuration file.
///
/// Entries are validated into [`pgvault_core::TenantConfig`] by
/// [`crate::registry::TenantRegistry::from_entries`].
///
/// # Example
///
/// ```toml
/// [[tenants]]
/// id = "ACME"
/// name = "Acme inventory"
/// host = "db.acme.internal"
/// user = "acme_owner"
/// password_env = "ACME_DB_PASSWORD"
/// database = "acme"
/// tables = ["inventory.app_config", "inventory.person", "inventory.booking"]
///
/// [tenants.folders]
/// backup = "acme-backups"
/// ```
#[derive(Debug, Deserialize)]
pub struct TenantEntry {
    pub id: String,
    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Environment variable holding the password, used when `password` is
    /// not set.
    #[serde(default)]
    pub password_env: Option<String>,
    pub database: String,
    #[serde(default)]
    pub ssl_mode: Option<String>,
    /// Expected `aud` claim of bearer tokens for this tenant.
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Dumped and restored tables, parents before children.
    pub tables: Vec<String>,
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,
    /// Fallback column offset of the schema version in the metadata table.
    #[serde(default = "default_version_offset")]
    pub version_offset: usize,
    #[serde(default)]
    pub folders: FolderEntry,
}

/// Storage folder ids owned by a tenant.
#[derive(Debug, Default, Deserialize)]
pub struct FolderEntry {
    #[serde(default)]
    pub backup: Option<String>,
    #[serde(default)]
    pub inventory: Option<String>,
}

impl TenantEntry {
    /// The database password, from the file or from `password_env`.
    pub fn password(&self) -> Result<SecretString, ServerError> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        let Some(var) = &self.password_env else {
            return Err(ServerError::Config(format!(
                "tenant {}: set password or password_env",
                self.id
            )));
        };
        std::env::var(var).map(SecretString::new).map_err(|_| {
            ServerError::Config(format!("tenant {}: ${var} is not set", self.id))
        })
    }
}

fn default_port() -> u16 {
    5432
}

fn default_audience() -> String {
    "authenticated".to_owned()
}

fn default_metadata_table() -> String {
    "inventory.app_config".to_owned()
}

fn default_version_offset() -> usize {
    5
}

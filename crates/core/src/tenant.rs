use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::table::QualifiedTable;

/// Identifier of one logical database (tenant).
///
/// Tenant ids appear in URL paths and artifact names, so only ASCII
/// letters, digits, `_` and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(Self(id))
        } else {
            Err(CoreError::InvalidTenantId(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// The closed set of storage folders a tenant can own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderKind {
    Backup,
    Inventory,
}

impl fmt::Display for FolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Inventory => write!(f, "inventory"),
        }
    }
}

/// Storage folder ids owned by a tenant, one per [`FolderKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantFolders {
    pub backup: Option<String>,
    pub inventory: Option<String>,
}

impl TenantFolders {
    pub fn get(&self, kind: FolderKind) -> Option<&str> {
        match kind {
            FolderKind::Backup => self.backup.as_deref(),
            FolderKind::Inventory => self.inventory.as_deref(),
        }
    }
}

/// SSL mode used when a tenant does not configure one.
pub const DEFAULT_SSL_MODE: &str = "require";

/// How to reach a tenant's live database.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Redacted in `Debug` output.
    pub password: SecretString,
    pub database: String,
    /// libpq SSL mode (`disable`, `prefer`, `require`, `verify-ca`, `verify-full`).
    pub ssl_mode: Option<String>,
}

impl ConnectionSettings {
    pub fn ssl_mode_or_default(&self) -> &str {
        self.ssl_mode.as_deref().unwrap_or(DEFAULT_SSL_MODE)
    }
}

/// Immutable per-tenant configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub id: TenantId,
    /// Human readable name shown by the tenant listing.
    pub name: String,
    pub connection: ConnectionSettings,
    /// Expected `aud` claim of bearer tokens for this tenant.
    pub audience: String,
    /// Tables covered by dump and restore, parents before children.
    pub tables: Vec<QualifiedTable>,
    /// Single-row table holding watermarks and schema/app versions.
    pub metadata_table: QualifiedTable,
    /// Column offset of the schema version inside the metadata table's
    /// copy-block, used when the block header does not name the column.
    pub version_offset: usize,
    pub folders: TenantFolders,
}

impl TenantConfig {
    /// Resolve the folder id of the given kind.
    pub fn folder(&self, kind: FolderKind) -> Result<&str, CoreError> {
        self.folders
            .get(kind)
            .ok_or_else(|| CoreError::MissingFolder {
                tenant: self.id.to_string(),
                kind,
            })
    }

    /// Restore order: parents before children.
    pub fn restore_order(&self) -> impl Iterator<Item = &QualifiedTable> {
        self.tables.iter()
    }

    /// Truncate order: children before parents.
    pub fn truncate_order(&self) -> impl Iterator<Item = &QualifiedTable> {
        self.tables.iter().rev()
    }

    /// Tables a dump parser must retain for this tenant: the restore list
    /// plus the metadata table that carries the version marker.
    pub fn retained_tables(&self) -> Vec<QualifiedTable> {
        let mut tables = self.tables.clone();
        if !tables.contains(&self.metadata_table) {
            tables.push(self.metadata_table.clone());
        }
        tables
    }
}

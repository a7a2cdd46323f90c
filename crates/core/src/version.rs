use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Schema and application version held in the tenant's metadata row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VersionSnapshot {
    pub schema_version: Option<String>,
    pub app_version: Option<String>,
}

/// Reconciliation strategy used by a restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum RestoreMode {
    /// Exact column lists from the dump; requires matching schema versions.
    Strict,
    /// Intersection of dump columns and live columns.
    Tolerant,
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Tolerant => write!(f, "tolerant"),
        }
    }
}

/// Why a strict restore was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaMismatch {
    #[error("backup carries no schema version; strict restore is not possible")]
    UnknownBackupVersion,

    #[error("schema version mismatch: backup {backup}, current {current}")]
    Differs { backup: String, current: String },
}

/// Normalize a raw version marker: blank values count as unknown.
pub fn normalize_version(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the restore mode.
///
/// A strict request succeeds only when the backup version is known and
/// equals the live version. Without a strict request the restore is always
/// tolerant.
pub fn select_mode(
    strict_requested: bool,
    backup: Option<&str>,
    current: Option<&str>,
) -> Result<RestoreMode, SchemaMismatch> {
    if !strict_requested {
        return Ok(RestoreMode::Tolerant);
    }
    let Some(backup) = normalize_version(backup) else {
        return Err(SchemaMismatch::UnknownBackupVersion);
    };
    match normalize_version(current) {
        Some(current) if current == backup => Ok(RestoreMode::Strict),
        current => Err(SchemaMismatch::Differs {
            backup: backup.to_owned(),
            current: current.unwrap_or("unknown").to_owned(),
        }),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use pgvault_core::{RestoreMode, SchemaVersions, TableReport};

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status indicator.
    #[schema(example = "ok")]
    pub status: String,
    /// Number of configured tenants.
    #[schema(example = 3)]
    pub tenants: usize,
}

/// Generic error response returned on failures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    #[schema(example = "unknown database: ACME")]
    pub error: String,
}

/// A configured tenant, without connection details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabaseSummary {
    #[schema(example = "ACME")]
    pub id: String,
    #[schema(example = "Acme inventory")]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DatabasesResponse {
    #[schema(example = "success")]
    pub status: String,
    pub databases: Vec<DatabaseSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Success,
    Skipped,
}

/// Outcome of `POST /backup/{tenant}`.
///
/// `file` and `id` are set on success, `reason` when the backup was skipped.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupResponse {
    pub status: BackupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "backup_ACME_20240101T000000.sql")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Backup already up-to-date")]
    pub reason: Option<String>,
}

/// One stored backup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupEntry {
    pub id: String,
    #[schema(example = "backup_ACME_20240101T000000.sql")]
    pub name: String,
    /// When the storage backend recorded the upload.
    #[serde(rename = "createdTime")]
    pub created_time: DateTime<Utc>,
    /// Dump time parsed from the name, `null` when the name does not parse.
    pub backup_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BackupListResponse {
    #[schema(example = "success")]
    pub status: String,
    /// Newest first.
    pub backups: Vec<BackupEntry>,
}

/// Body of `POST /restore/{tenant}`.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct RestoreRequest {
    /// Storage id of the artifact to restore.
    #[serde(default)]
    pub drive_file_id: Option<String>,
    /// Require the backup schema version to equal the live one.
    #[serde(default)]
    pub strict: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RestoreResponse {
    #[schema(example = "success")]
    pub status: String,
    pub mode: RestoreMode,
    pub schema: SchemaVersions,
    /// Per-table row counts.
    pub tables: Vec<TableReport>,
}

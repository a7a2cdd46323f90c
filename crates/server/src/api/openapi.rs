#![allow(clippy::needless_for_each)]

use pgvault_core::{RestoreMode, SchemaVersions, TableReport};

use super::schemas::{
    BackupEntry, BackupListResponse, BackupResponse, BackupStatus, DatabaseSummary,
    DatabasesResponse, ErrorResponse, HealthResponse, RestoreRequest, RestoreResponse,
};

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "pgvault API",
        version = "0.1.0",
        description = "Back up, list and restore tenant databases.",
        license(name = "Apache-2.0")
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Databases", description = "Configured tenants"),
        (name = "Backups", description = "Backup creation and listing"),
        (name = "Restore", description = "Strict and tolerant restore")
    ),
    paths(
        super::health::health,
        super::tenants::list_databases,
        super::backup::create_backup,
        super::backup::list_backups,
        super::restore::restore_backup,
    ),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        DatabaseSummary,
        DatabasesResponse,
        BackupStatus,
        BackupResponse,
        BackupEntry,
        BackupListResponse,
        RestoreRequest,
        RestoreResponse,
        RestoreMode,
        SchemaVersions,
        TableReport,
    ))
)]
pub struct ApiDoc;

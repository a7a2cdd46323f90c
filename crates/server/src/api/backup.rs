use axum::Json;
use axum::extract::State;
use tracing::info;

use super::AppState;
use super::schemas::{
    BackupEntry, BackupListResponse, BackupResponse, BackupStatus, ErrorResponse,
};
use crate::auth::TenantCaller;
use crate::error::ApiError;
use crate::service::BackupOutcome;

/// `POST /backup/{tenant}` -- dump the tenant and upload the result.
#[utoipa::path(
    post,
    path = "/backup/{tenant}",
    tag = "Backups",
    summary = "Back up a database",
    description = "Dumps the tenant's tables and uploads the dump to its backup folder, unless nothing changed since the last export. Old backups are rotated afterwards.",
    params(("tenant" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Backup uploaded or skipped", body = BackupResponse),
        (status = 401, description = "Missing, expired or invalid token", body = ErrorResponse),
        (status = 403, description = "Role not allowed", body = ErrorResponse),
        (status = 404, description = "Unknown tenant or backup folder", body = ErrorResponse),
        (status = 409, description = "Another operation is running on the tenant", body = ErrorResponse),
        (status = 500, description = "Dump or upload failed", body = ErrorResponse)
    )
)]
pub async fn create_backup(
    State(state): State<AppState>,
    auth: TenantCaller,
) -> Result<Json<BackupResponse>, ApiError> {
    info!(tenant = %auth.tenant.id, role = %auth.caller.role, "backup requested");
    let response = match state.backups.backup(&auth.tenant).await? {
        BackupOutcome::Uploaded { artifact, .. } => BackupResponse {
            status: BackupStatus::Success,
            file: Some(artifact.name),
            id: Some(artifact.id),
            reason: None,
        },
        BackupOutcome::Skipped { .. } => BackupResponse {
            status: BackupStatus::Skipped,
            file: None,
            id: None,
            reason: Some("Backup already up-to-date".to_owned()),
        },
    };
    Ok(Json(response))
}

/// `GET /backup-list/{tenant}` -- stored backups, newest first.
#[utoipa::path(
    get,
    path = "/backup-list/{tenant}",
    tag = "Backups",
    summary = "List backups",
    params(("tenant" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Backups of the tenant", body = BackupListResponse),
        (status = 401, description = "Missing, expired or invalid token", body = ErrorResponse),
        (status = 403, description = "Role not allowed, or storage access denied", body = ErrorResponse),
        (status = 404, description = "Unknown tenant or backup folder", body = ErrorResponse),
        (status = 500, description = "Storage failure", body = ErrorResponse)
    )
)]
pub async fn list_backups(
    State(state): State<AppState>,
    auth: TenantCaller,
) -> Result<Json<BackupListResponse>, ApiError> {
    let naming = state.backups.naming();
    let backups = state
        .backups
        .list(&auth.tenant)
        .await?
        .into_iter()
        .map(|artifact| BackupEntry {
            backup_time: naming.parse_time(&auth.tenant.id, &artifact.name),
            id: artifact.id,
            name: artifact.name,
            created_time: artifact.created_at,
        })
        .collect();
    Ok(Json(BackupListResponse {
        status: "success".to_owned(),
        backups,
    }))
}

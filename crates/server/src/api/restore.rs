use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::info;

use pgvault_core::{RestoreProgress, RestoreState};

use super::AppState;
use super::schemas::{ErrorResponse, RestoreRequest, RestoreResponse};
use crate::auth::TenantCaller;
use crate::error::ApiError;

/// `POST /restore/{tenant}` -- replay a stored backup into the live database.
#[utoipa::path(
    post,
    path = "/restore/{tenant}",
    tag = "Restore",
    summary = "Restore a backup",
    description = "Replaces the tenant's tables with the content of a stored backup inside one transaction. Strict mode requires the backup schema version to equal the live one; tolerant mode restores the columns both sides share.",
    params(("tenant" = String, Path, description = "Tenant id")),
    request_body(content = RestoreRequest, description = "Backup to restore"),
    responses(
        (status = 200, description = "Restore committed", body = RestoreResponse),
        (status = 400, description = "Missing drive_file_id or artifact outside the backup folder", body = ErrorResponse),
        (status = 401, description = "Missing, expired or invalid token", body = ErrorResponse),
        (status = 403, description = "Role not allowed", body = ErrorResponse),
        (status = 404, description = "Unknown tenant or artifact", body = ErrorResponse),
        (status = 409, description = "Another operation is running on the tenant", body = ErrorResponse),
        (status = 500, description = "Restore rolled back", body = ErrorResponse)
    )
)]
pub async fn restore_backup(
    State(state): State<AppState>,
    auth: TenantCaller,
    body: Result<Json<RestoreRequest>, JsonRejection>,
) -> Result<Json<RestoreResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let artifact_id = request
        .drive_file_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("drive_file_id required".to_owned()))?;

    let mut progress = RestoreProgress::new();
    progress.advance(RestoreState::Authorized)?;
    info!(
        tenant = %auth.tenant.id,
        role = %auth.caller.role,
        artifact = artifact_id,
        strict = request.strict,
        "restore requested"
    );

    let report = state
        .restores
        .restore(&auth.tenant, artifact_id, request.strict, &mut progress)
        .await?;
    Ok(Json(RestoreResponse {
        status: "success".to_owned(),
        mode: report.mode,
        schema: report.schema,
        tables: report.tables,
    }))
}

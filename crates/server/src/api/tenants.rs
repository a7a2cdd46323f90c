use axum::Json;
use axum::extract::State;

use super::AppState;
use super::schemas::{DatabaseSummary, DatabasesResponse};

/// `GET /databases` -- configured tenants, in configuration order.
#[utoipa::path(
    get,
    path = "/databases",
    tag = "Databases",
    summary = "List databases",
    description = "Returns the id and display name of every configured tenant. Connection details are never included.",
    responses(
        (status = 200, description = "Configured tenants", body = DatabasesResponse)
    )
)]
pub async fn list_databases(State(state): State<AppState>) -> Json<DatabasesResponse> {
    let databases = state
        .registry
        .iter()
        .map(|tenant| DatabaseSummary {
            id: tenant.id.to_string(),
            name: tenant.name.clone(),
        })
        .collect();
    Json(DatabasesResponse {
        status: "success".to_owned(),
        databases,
    })
}

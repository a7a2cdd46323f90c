use axum::Json;
use axum::extract::State;

use super::AppState;
use super::schemas::HealthResponse;

/// `GET /health` -- liveness and the number of configured tenants.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    summary = "Health check",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        tenants: state.registry.len(),
    })
}

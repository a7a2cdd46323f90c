pub mod backup;
pub mod health;
pub mod openapi;
pub mod restore;
pub mod schemas;
pub mod tenants;
pub mod trace_context;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::JwtVerifier;
use crate::registry::TenantRegistry;
use crate::service::{BackupService, RestoreService};

use self::openapi::ApiDoc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Configured tenants.
    pub registry: Arc<TenantRegistry>,
    pub backups: Arc<BackupService>,
    pub restores: Arc<RestoreService>,
    /// Token verifier (None when auth is disabled).
    pub auth: Option<Arc<JwtVerifier>>,
}

/// Build the Axum router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/databases", get(tenants::list_databases))
        .route("/backup/{tenant}", post(backup::create_backup))
        .route("/backup-list/{tenant}", get(backup::list_backups))
        .route("/restore/{tenant}", post(restore::restore_backup))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(middleware::from_fn(trace_context::propagate_trace_context))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

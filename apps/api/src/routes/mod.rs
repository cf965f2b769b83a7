pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::cleanup::handlers as cleanup;
use crate::resumes::handlers;
use crate::state::AppState;

/// Headroom for multipart framing and the text fields around the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes + MULTIPART_OVERHEAD);

    let api = Router::new()
        .route(
            "/api/v1/resumes",
            get(handlers::handle_list)
                .post(handlers::handle_upload)
                .layer(upload_limit),
        )
        .route(
            "/api/v1/resumes/:id",
            get(handlers::handle_get).delete(handlers::handle_delete),
        )
        .route(
            "/api/v1/resumes/:id/download",
            get(handlers::handle_download),
        )
        // Operator endpoints
        .route(
            "/api/v1/admin/resumes/cleanup",
            post(cleanup::handle_cleanup),
        )
        .route(
            "/api/v1/admin/resumes/storage-report",
            get(cleanup::handle_storage_report),
        )
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    // Previews set their own CORS headers and answer preflight with 204,
    // so they stay outside the permissive layer.
    let previews = Router::new().route(
        "/api/v1/resumes/:id/preview",
        get(handlers::handle_preview).options(handlers::handle_preview_options),
    );

    Router::new()
        .route("/health", get(health::health_handler))
        .merge(api)
        .merge(previews)
        .with_state(state)
}

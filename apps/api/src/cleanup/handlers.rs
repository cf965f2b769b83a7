use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::auth::AdminAccess;
use crate::cleanup::{run_cleanup, storage_report, CleanupOptions, CleanupSummary, StorageReport};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CleanupQuery {
    #[serde(default)]
    pub dry_run: bool,
}

/// POST /api/v1/admin/resumes/cleanup
pub async fn handle_cleanup(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Query(params): Query<CleanupQuery>,
) -> Result<Json<CleanupSummary>, AppError> {
    let options = CleanupOptions {
        batch_size: state.config.cleanup_batch_size,
        dry_run: params.dry_run,
    };
    let summary = run_cleanup(state.resumes.as_ref(), &state.legacy, options).await?;
    Ok(Json(summary))
}

/// GET /api/v1/admin/resumes/storage-report
pub async fn handle_storage_report(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Result<Json<StorageReport>, AppError> {
    Ok(Json(storage_report(state.resumes.as_ref()).await?))
}

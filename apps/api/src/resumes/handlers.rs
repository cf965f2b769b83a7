//! Axum route handlers for the Resume API.

use axum::{
    extract::{rejection::PathRejection, Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::ResumeDescriptor;
use crate::resumes::delivery::{delete_resume, download, load_owned, preview};
use crate::resumes::response::{
    apply_preview_cors, delivery_response, preflight_response, Disposition,
};
use crate::resumes::upload::{upload_resume, UploadLimits, UploadRequest, UploadedFile};
use crate::state::AppState;

/// POST /api/v1/resumes
/// Multipart fields: `file` (required), `title` (required), `description`.
pub async fn handle_upload(
    auth: AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeDescriptor>), AppError> {
    let mut file: Option<UploadedFile> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes: Bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
                file = Some(UploadedFile {
                    original_name,
                    content_type,
                    bytes,
                });
            }
            Some("title") => title = Some(read_text(field, "title").await?),
            Some("description") => description = Some(read_text(field, "description").await?),
            _ => {} // Ignore unknown fields.
        }
    }

    let file = file.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;
    let title = title.ok_or_else(|| AppError::Validation("Missing 'title' field".into()))?;

    let limits = UploadLimits {
        max_bytes: state.config.max_upload_bytes,
        external_timeout: state.config.external_store_timeout,
    };
    let record = upload_resume(
        state.resumes.as_ref(),
        state.object_store.as_deref(),
        limits,
        UploadRequest {
            owner_id: auth.user_id,
            title,
            description,
            file,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(ResumeDescriptor::from(record))))
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))
}

/// GET /api/v1/resumes
pub async fn handle_list(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeDescriptor>>, AppError> {
    let rows = state.resumes.find_by_owner(auth.user_id).await?;
    Ok(Json(rows.iter().map(ResumeDescriptor::from).collect()))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeDescriptor>, AppError> {
    let record = load_owned(state.resumes.as_ref(), id, auth.user_id).await?;
    Ok(Json(ResumeDescriptor::from(record)))
}

/// GET /api/v1/resumes/:id/preview
/// Errors carry the CORS headers too so embedding pages can read the status.
pub async fn handle_preview(
    auth: Result<AuthUser, AppError>,
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    headers: HeaderMap,
) -> Response {
    // Rejections are turned into AppError here so they carry the CORS headers too.
    let result = match (auth, path) {
        (Err(e), _) => Err(e),
        (Ok(_), Err(rejection)) => Err(AppError::Validation(format!(
            "Invalid resume id: {}",
            rejection.body_text()
        ))),
        (Ok(auth), Ok(Path(id))) => {
            preview(state.resumes.as_ref(), &state.legacy, id, auth.user_id)
                .await
                .map(|d| delivery_response(d, Disposition::Inline, &headers))
        }
    };

    let mut response = result.unwrap_or_else(IntoResponse::into_response);
    apply_preview_cors(response.headers_mut());
    response
}

/// OPTIONS /api/v1/resumes/:id/preview
pub async fn handle_preview_options() -> Response {
    preflight_response()
}

/// GET /api/v1/resumes/:id/download
pub async fn handle_download(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let delivery = download(state.resumes.as_ref(), &state.legacy, id, auth.user_id).await?;
    Ok(delivery_response(delivery, Disposition::Attachment, &headers))
}

/// DELETE /api/v1/resumes/:id
pub async fn handle_delete(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_resume(
        state.resumes.as_ref(),
        state.object_store.as_deref(),
        id,
        auth.user_id,
        state.config.external_store_timeout,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

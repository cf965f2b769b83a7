//! Owner-gated access to stored resumes: preview, download and delete.

use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeRow;
use crate::storage::{delete_within, resolve, LegacyFiles, ObjectStore, Resolution, ResumeStore};

/// A resolved, servable resume. `resolution` is never `NotFound`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub record: ResumeRow,
    pub resolution: Resolution,
}

/// Loads a record and checks ownership. Existence is not hidden from
/// non-owners, only access.
pub async fn load_owned(
    store: &dyn ResumeStore,
    id: Uuid,
    requester: Uuid,
) -> Result<ResumeRow, AppError> {
    let record = store
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))?;

    if !record.is_owned_by(requester) {
        return Err(AppError::Forbidden);
    }
    Ok(record)
}

async fn resolve_owned(
    store: &dyn ResumeStore,
    legacy: &LegacyFiles,
    id: Uuid,
    requester: Uuid,
) -> Result<Delivery, AppError> {
    let record = load_owned(store, id, requester).await?;
    let resolution = resolve(&record, legacy).await;
    if resolution == Resolution::NotFound {
        warn!(
            "Resume {id} has no retrievable content (storage: {})",
            record.storage().kind()
        );
        return Err(AppError::NotFound(format!(
            "Resume file for {id} is unavailable, please re-upload it"
        )));
    }
    Ok(Delivery { record, resolution })
}

pub async fn preview(
    store: &dyn ResumeStore,
    legacy: &LegacyFiles,
    id: Uuid,
    requester: Uuid,
) -> Result<Delivery, AppError> {
    resolve_owned(store, legacy, id, requester).await
}

/// Like [`preview`], and counts the download. A failed increment is logged
/// and never fails the download.
pub async fn download(
    store: &dyn ResumeStore,
    legacy: &LegacyFiles,
    id: Uuid,
    requester: Uuid,
) -> Result<Delivery, AppError> {
    let delivery = resolve_owned(store, legacy, id, requester).await?;
    if let Err(e) = store.increment_download_count(id).await {
        warn!("Failed to increment download count for resume {id}: {e}");
    }
    Ok(delivery)
}

/// Removes the record. The external object is deleted best-effort first,
/// bounded by `timeout`; a failure there is logged and the record is removed
/// regardless.
pub async fn delete_resume(
    store: &dyn ResumeStore,
    object_store: Option<&dyn ObjectStore>,
    id: Uuid,
    requester: Uuid,
    timeout: Duration,
) -> Result<(), AppError> {
    let record = load_owned(store, id, requester).await?;

    if let Some(object_id) = record.external_object_id.as_deref().filter(|o| !o.is_empty()) {
        match object_store {
            Some(object_store) => {
                if let Err(e) = delete_within(object_store, object_id, timeout).await {
                    warn!("Failed to delete external object {object_id} for resume {id}: {e}");
                }
            }
            None => warn!(
                "Resume {id} references external object {object_id} but no external store is configured"
            ),
        }
    }

    if !store.delete(id).await? {
        return Err(AppError::NotFound(format!("Resume {id} not found")));
    }
    info!("Deleted resume {id} for user {requester}");
    Ok(())
}

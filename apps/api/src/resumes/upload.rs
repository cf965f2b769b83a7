//! Upload flow: validate, place the bytes, then persist the record.
//!
//! Placement is an explicit two-way outcome. The external store is tried
//! first (bounded by a timeout); any failure or an unconfigured store lands
//! the bytes in the record instead. Nothing is persisted until one backend
//! holds the file.

use std::time::Duration;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::{NewResume, NewStorage, ResumeRow};
use crate::storage::{delete_within, ObjectStore, ObjectStoreError, ResumeStore, StoredObject};

pub const PDF: &str = "application/pdf";
pub const DOC: &str = "application/msword";
pub const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ACCEPTED_TYPES: [&str; 3] = [PDF, DOC, DOCX];
const MAX_TITLE_CHARS: usize = 200;
const MAX_FILENAME_CHARS: usize = 255;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub file: UploadedFile,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub external_timeout: Duration,
}

/// Where the bytes ended up.
#[derive(Debug)]
pub enum Placement {
    External(StoredObject),
    /// Kept in-record; `reason` says why the external store was not used.
    Embedded { reason: ObjectStoreError },
}

/// Validated, normalised upload metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
}

pub async fn upload_resume(
    store: &dyn ResumeStore,
    object_store: Option<&dyn ObjectStore>,
    limits: UploadLimits,
    request: UploadRequest,
) -> Result<ResumeRow, AppError> {
    let title = validate_title(&request.title)?;
    let meta = validate_file(&request.file, limits.max_bytes)?;
    let description = request
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    let key = object_key(request.owner_id, &meta.stored_name);
    let bytes = request.file.bytes;
    let size_bytes = bytes.len() as i64;

    let placement = place_file(
        object_store,
        &key,
        bytes.clone(),
        &meta.mime_type,
        limits.external_timeout,
    )
    .await;

    let storage = match placement {
        Placement::External(obj) => {
            info!("Stored resume upload externally as {}", obj.object_id);
            NewStorage::External {
                url: obj.url,
                object_id: obj.object_id,
            }
        }
        Placement::Embedded { reason } => {
            match reason {
                ObjectStoreError::NotConfigured => {
                    info!("External store not configured, storing resume in database")
                }
                other => warn!("External upload failed ({other}), storing resume in database"),
            }
            NewStorage::Embedded(bytes)
        }
    };

    let orphan = match &storage {
        NewStorage::External { object_id, .. } => Some(object_id.clone()),
        NewStorage::Embedded(_) => None,
    };

    let new = NewResume {
        owner_id: request.owner_id,
        title,
        description,
        original_name: meta.original_name,
        stored_name: meta.stored_name,
        mime_type: meta.mime_type,
        size_bytes,
        storage,
    };

    match store.create(new).await {
        Ok(row) => {
            info!(
                "Created resume {} for user {} ({} bytes, {})",
                row.id,
                row.owner_id,
                row.size_bytes,
                row.storage().kind()
            );
            Ok(row)
        }
        Err(e) => {
            // Don't leave an object behind that no record points to.
            if let (Some(object_id), Some(object_store)) = (orphan, object_store) {
                if let Err(del) =
                    delete_within(object_store, &object_id, limits.external_timeout).await
                {
                    warn!("Failed to remove orphaned object {object_id}: {del}");
                }
            }
            Err(e.into())
        }
    }
}

/// Tries the external store; every failure mode becomes `Embedded`.
pub async fn place_file(
    object_store: Option<&dyn ObjectStore>,
    key: &str,
    bytes: Bytes,
    content_type: &str,
    timeout: Duration,
) -> Placement {
    let Some(object_store) = object_store else {
        return Placement::Embedded {
            reason: ObjectStoreError::NotConfigured,
        };
    };

    match tokio::time::timeout(timeout, object_store.upload(key, bytes, content_type)).await {
        Ok(Ok(obj)) => Placement::External(obj),
        Ok(Err(e)) => Placement::Embedded { reason: e },
        Err(_) => Placement::Embedded {
            reason: ObjectStoreError::Timeout(timeout.as_secs()),
        },
    }
}

pub fn object_key(owner_id: Uuid, stored_name: &str) -> String {
    format!("resumes/{owner_id}/{stored_name}")
}

fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}

pub fn validate_file(file: &UploadedFile, max_bytes: usize) -> Result<FileMeta, AppError> {
    if file.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".into()));
    }
    if file.bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the {max_bytes} byte limit"
        )));
    }

    let original_name = sanitize_filename(&file.original_name)
        .ok_or_else(|| AppError::Validation("File must have a filename".into()))?;
    let extension = extension_of(&original_name);

    let mime_type = detect_mime(extension.as_deref(), file.content_type.as_deref())
        .ok_or_else(|| {
            AppError::Validation("Only PDF, DOC and DOCX files are allowed".into())
        })?;

    let stored_name = match extension {
        Some(ext) => format!("resume-{}.{ext}", Uuid::new_v4().simple()),
        None => format!("resume-{}", Uuid::new_v4().simple()),
    };

    Ok(FileMeta {
        original_name,
        stored_name,
        mime_type,
    })
}

/// Extension first, then the declared type; `None` if not an accepted document.
fn detect_mime(extension: Option<&str>, declared: Option<&str>) -> Option<String> {
    // A recognised extension decides on its own.
    if let Some(guess) = extension.and_then(|ext| mime_guess::from_ext(ext).first()) {
        let essence = guess.essence_str();
        return ACCEPTED_TYPES
            .contains(&essence)
            .then(|| essence.to_string());
    }
    declared
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| ACCEPTED_TYPES.contains(&ct.as_str()))
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Keeps only the final path segment and strips characters that would break
/// a `Content-Disposition` header.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .take(MAX_FILENAME_CHARS)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_string())
    }
}

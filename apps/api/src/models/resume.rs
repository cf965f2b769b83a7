use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::storage::StorageLocation;

#[derive(Debug, Clone, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_name: String,
    pub stored_name: String,
    pub external_url: Option<String>,
    pub external_object_id: Option<String>,
    pub blob_content: Option<Vec<u8>>,
    pub legacy_path: Option<String>,
    pub size_bytes: i64,
    pub mime_type: String,
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    /// The backend that serves this record's content, by priority:
    /// external URL, then embedded bytes, then the legacy path.
    pub fn storage(&self) -> StorageLocation<'_> {
        StorageLocation::from_columns(
            self.external_url.as_deref(),
            self.external_object_id.as_deref(),
            self.blob_content.as_deref(),
            self.legacy_path.as_deref(),
        )
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

/// Where a freshly uploaded file was placed. Exactly one backend, never legacy.
#[derive(Debug, Clone)]
pub enum NewStorage {
    External { url: String, object_id: String },
    Embedded(Bytes),
}

/// Everything the record store needs to persist a new resume.
#[derive(Debug, Clone)]
pub struct NewResume {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_name: String,
    pub stored_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub storage: NewStorage,
}

/// Predicates the record store can count or scan by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeFilter {
    All,
    External,
    Embedded,
    /// Only a legacy path remains: no usable external URL, no bytes.
    Broken,
    /// No backend field populated at all.
    Unresolvable,
}

impl ResumeFilter {
    pub fn matches(&self, row: &ResumeRow) -> bool {
        match self {
            ResumeFilter::All => true,
            ResumeFilter::External => matches!(row.storage(), StorageLocation::External { .. }),
            ResumeFilter::Embedded => matches!(row.storage(), StorageLocation::Embedded { .. }),
            ResumeFilter::Broken => matches!(row.storage(), StorageLocation::LegacyLocal { .. }),
            ResumeFilter::Unresolvable => matches!(row.storage(), StorageLocation::Missing),
        }
    }
}

/// Client-facing view of a resume. Never exposes backend pointers or bytes.
#[derive(Debug, Clone, Serialize)]
pub struct ResumeDescriptor {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: String,
    pub storage: &'static str,
    pub download_count: i64,
    pub preview_url: String,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ResumeRow> for ResumeDescriptor {
    fn from(row: &ResumeRow) -> Self {
        ResumeDescriptor {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            original_name: row.original_name.clone(),
            size_bytes: row.size_bytes,
            mime_type: row.mime_type.clone(),
            storage: row.storage().kind(),
            download_count: row.download_count,
            preview_url: format!("/api/v1/resumes/{}/preview", row.id),
            download_url: format!("/api/v1/resumes/{}/download", row.id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ResumeRow> for ResumeDescriptor {
    fn from(row: ResumeRow) -> Self {
        ResumeDescriptor::from(&row)
    }
}

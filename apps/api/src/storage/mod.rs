//! Resume storage backends and resolution.
//!
//! A resume's bytes live in exactly one of three places: the external object
//! store (S3 / MinIO), the `blob_content` column, or a deprecated on-disk
//! path. [`StorageLocation`] is the typed view of those columns and
//! [`resolve`] turns it into something a handler can serve.

pub mod legacy;
pub mod object_store;
pub mod record_store;

use bytes::Bytes;
use tracing::warn;

pub use legacy::LegacyFiles;
pub use object_store::{delete_within, ObjectStore, ObjectStoreError, S3ObjectStore, StoredObject};
pub use record_store::{PgResumeStore, ResumeStore, StoreError};

use crate::models::resume::ResumeRow;

/// Typed view over a record's backend columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLocation<'a> {
    External {
        url: &'a str,
        object_id: Option<&'a str>,
    },
    Embedded {
        bytes: &'a [u8],
    },
    LegacyLocal {
        path: &'a str,
    },
    Missing,
}

impl<'a> StorageLocation<'a> {
    /// Picks the authoritative backend. An external URL wins even when stale
    /// bytes are still embedded; empty blobs count as absent.
    pub fn from_columns(
        external_url: Option<&'a str>,
        external_object_id: Option<&'a str>,
        blob_content: Option<&'a [u8]>,
        legacy_path: Option<&'a str>,
    ) -> Self {
        if let Some(url) = external_url.filter(|u| is_external_url(u)) {
            return StorageLocation::External {
                url,
                object_id: external_object_id.filter(|id| !id.is_empty()),
            };
        }
        if let Some(bytes) = blob_content.filter(|b| !b.is_empty()) {
            return StorageLocation::Embedded { bytes };
        }
        if let Some(path) = legacy_path.filter(|p| !p.trim().is_empty()) {
            return StorageLocation::LegacyLocal { path };
        }
        StorageLocation::Missing
    }

    /// Short backend name reported to clients and operators.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageLocation::External { .. } => "external",
            StorageLocation::Embedded { .. } => "database",
            StorageLocation::LegacyLocal { .. } => "legacy",
            StorageLocation::Missing => "unavailable",
        }
    }
}

/// Older rows carry placeholders such as `database://content` or
/// `local://...` in the URL column. Only real http(s) URLs are external.
pub fn is_external_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("https://") || url.starts_with("http://")
}

/// Which backend produced streamed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    Database,
    LegacyDisk,
}

/// Outcome of resolving a record to servable content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect(String),
    Stream {
        body: Bytes,
        mime_type: String,
        source: ContentSource,
    },
    NotFound,
}

/// Resolves a record to a redirect, a byte stream, or nothing.
///
/// Only the legacy branch touches the filesystem; a legacy file that is gone
/// or unreadable resolves to `NotFound`.
pub async fn resolve(record: &ResumeRow, legacy: &LegacyFiles) -> Resolution {
    match record.storage() {
        StorageLocation::External { url, .. } => Resolution::Redirect(url.to_string()),
        StorageLocation::Embedded { bytes } => Resolution::Stream {
            body: Bytes::copy_from_slice(bytes),
            mime_type: effective_mime(&record.mime_type),
            source: ContentSource::Database,
        },
        StorageLocation::LegacyLocal { path } => match legacy.read(path).await {
            Ok(Some(body)) => Resolution::Stream {
                body,
                mime_type: effective_mime(&record.mime_type),
                source: ContentSource::LegacyDisk,
            },
            Ok(None) => Resolution::NotFound,
            Err(e) => {
                warn!("Legacy file for resume {} unreadable: {e}", record.id);
                Resolution::NotFound
            }
        },
        StorageLocation::Missing => Resolution::NotFound,
    }
}

fn effective_mime(mime_type: &str) -> String {
    if mime_type.trim().is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::legacy_row;
    use uuid::Uuid;

    #[test]
    fn test_external_url_takes_priority_over_everything() {
        let loc = StorageLocation::from_columns(
            Some("https://res.example.com/resumes/a.pdf"),
            Some("resumes/a.pdf"),
            Some(&b"stale bytes"[..]),
            Some("uploads/resumes/a.pdf"),
        );
        assert_eq!(
            loc,
            StorageLocation::External {
                url: "https://res.example.com/resumes/a.pdf",
                object_id: Some("resumes/a.pdf"),
            }
        );
    }

    #[test]
    fn test_sentinel_urls_are_not_external() {
        let loc = StorageLocation::from_columns(
            Some("database://content"),
            None,
            Some(&b"%PDF"[..]),
            None,
        );
        assert_eq!(loc, StorageLocation::Embedded { bytes: b"%PDF" });

        let loc = StorageLocation::from_columns(
            Some("local://uploads/resumes/x.pdf"),
            None,
            None,
            Some("uploads/resumes/x.pdf"),
        );
        assert_eq!(
            loc,
            StorageLocation::LegacyLocal {
                path: "uploads/resumes/x.pdf"
            }
        );
    }

    #[test]
    fn test_empty_blob_and_blank_path_are_missing() {
        let loc = StorageLocation::from_columns(None, None, Some(&b""[..]), Some("  "));
        assert_eq!(loc, StorageLocation::Missing);
        assert_eq!(loc.kind(), "unavailable");
    }

    #[tokio::test]
    async fn test_resolve_redirects_even_with_stale_blob() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFiles::new(dir.path());
        let mut row = legacy_row(Uuid::new_v4(), "gone.pdf");
        row.blob_content = Some(b"old".to_vec());
        row.external_url = Some("https://cdn.example.com/r.pdf".into());

        assert_eq!(
            resolve(&row, &legacy).await,
            Resolution::Redirect("https://cdn.example.com/r.pdf".into())
        );
    }

    #[tokio::test]
    async fn test_resolve_streams_legacy_file_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.pdf"), b"%PDF-legacy").unwrap();
        let legacy = LegacyFiles::new(dir.path());
        let row = legacy_row(Uuid::new_v4(), "old.pdf");

        match resolve(&row, &legacy).await {
            Resolution::Stream { body, mime_type, source } => {
                assert_eq!(&body[..], b"%PDF-legacy");
                assert_eq!(mime_type, "application/pdf");
                assert_eq!(source, ContentSource::LegacyDisk);
            }
            other => panic!("expected stream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_missing_legacy_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFiles::new(dir.path());
        let row = legacy_row(Uuid::new_v4(), "deleted.pdf");
        assert_eq!(resolve(&row, &legacy).await, Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_resolve_defaults_blank_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let legacy = LegacyFiles::new(dir.path());
        let mut row = legacy_row(Uuid::new_v4(), "x.pdf");
        row.legacy_path = None;
        row.blob_content = Some(vec![1, 2, 3]);
        row.mime_type = String::new();

        match resolve(&row, &legacy).await {
            Resolution::Stream { mime_type, source, .. } => {
                assert_eq!(mime_type, "application/octet-stream");
                assert_eq!(source, ContentSource::Database);
            }
            other => panic!("expected stream, got {other:?}"),
        }
    }
}

//! Reconciliation of broken resume records.
//!
//! A record is broken when only a legacy path remains: no usable external
//! URL and no embedded bytes. If the legacy file is still on disk its bytes
//! are moved into the record; otherwise the record is deleted and the owner
//! has to re-upload. Each record is handled independently so one failure
//! (including a row deleted by a live request mid-scan) never stops the batch.

pub mod handlers;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::resume::{ResumeFilter, ResumeRow};
use crate::storage::{LegacyFiles, ResumeStore, StoreError};

#[derive(Debug, Clone, Copy)]
pub struct CleanupOptions {
    pub batch_size: i64,
    /// Classify only; perform no writes.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CleanupSummary {
    pub scanned: u64,
    pub migrated: u64,
    pub deleted: u64,
    pub dry_run: bool,
    pub failures: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CleanupFailure {
    pub resume_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Migrated,
    Deleted,
}

/// Scans all broken records in id order and migrates or deletes each one.
///
/// Only a failure to fetch the next page aborts the run.
pub async fn run_cleanup(
    store: &dyn ResumeStore,
    legacy: &LegacyFiles,
    options: CleanupOptions,
) -> Result<CleanupSummary, StoreError> {
    let mut summary = CleanupSummary {
        dry_run: options.dry_run,
        ..Default::default()
    };
    let batch_size = options.batch_size.max(1);
    let mut cursor: Option<Uuid> = None;

    loop {
        let page = store
            .find_page(ResumeFilter::Broken, cursor, batch_size)
            .await?;
        let Some(last) = page.last() else {
            break;
        };
        cursor = Some(last.id);
        let exhausted = (page.len() as i64) < batch_size;

        for record in &page {
            summary.scanned += 1;
            match reconcile(store, legacy, record, options.dry_run).await {
                Ok(Outcome::Migrated) => summary.migrated += 1,
                Ok(Outcome::Deleted) => summary.deleted += 1,
                Err(error) => {
                    warn!("Cleanup failed for resume {}: {error}", record.id);
                    summary.failures.push(CleanupFailure {
                        resume_id: record.id,
                        error,
                    });
                }
            }
        }

        if exhausted {
            break;
        }
    }

    info!(
        "Cleanup finished{}: scanned {}, migrated {}, deleted {}, failed {}",
        if options.dry_run { " (dry run)" } else { "" },
        summary.scanned,
        summary.migrated,
        summary.deleted,
        summary.failures.len()
    );
    Ok(summary)
}

async fn reconcile(
    store: &dyn ResumeStore,
    legacy: &LegacyFiles,
    record: &ResumeRow,
    dry_run: bool,
) -> Result<Outcome, String> {
    let path = record.legacy_path.as_deref().unwrap_or_default();
    let file = legacy
        .read(path)
        .await
        .map_err(|e| format!("failed to read legacy file '{path}': {e}"))?;

    match file {
        Some(bytes) if !bytes.is_empty() => {
            if !dry_run {
                store
                    .migrate_to_embedded(record.id, bytes)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            info!(
                "Migrated resume {} from legacy path '{path}' into the database",
                record.id
            );
            Ok(Outcome::Migrated)
        }
        _ => {
            if !dry_run && !store.delete(record.id).await.map_err(|e| e.to_string())? {
                return Err(format!("resume {} was already removed", record.id));
            }
            info!(
                "Removed resume {} (owner {}): legacy file '{path}' is gone, needs re-upload",
                record.id, record.owner_id
            );
            Ok(Outcome::Deleted)
        }
    }
}

/// Record counts per effective backend.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StorageReport {
    pub total: i64,
    pub external: i64,
    pub embedded: i64,
    pub broken: i64,
    pub unresolvable: i64,
}

pub async fn storage_report(store: &dyn ResumeStore) -> Result<StorageReport, StoreError> {
    Ok(StorageReport {
        total: store.count(ResumeFilter::All).await?,
        external: store.count(ResumeFilter::External).await?,
        embedded: store.count(ResumeFilter::Embedded).await?,
        broken: store.count(ResumeFilter::Broken).await?,
        unresolvable: store.count(ResumeFilter::Unresolvable).await?,
    })
}

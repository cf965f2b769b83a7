//! In-memory doubles for the record store and the object store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use crate::config::Config;
use crate::models::resume::{NewResume, NewStorage, ResumeFilter, ResumeRow};
use crate::state::AppState;
use crate::storage::{
    LegacyFiles, ObjectStore, ObjectStoreError, ResumeStore, StoreError, StoredObject,
};

pub const ADMIN_TOKEN: &str = "test-admin-token";

pub fn legacy_row(owner_id: Uuid, legacy_path: &str) -> ResumeRow {
    let now = Utc::now();
    ResumeRow {
        id: Uuid::new_v4(),
        owner_id,
        title: "Legacy resume".to_string(),
        description: None,
        original_name: "resume.pdf".to_string(),
        stored_name: "resume-1600000000000.pdf".to_string(),
        external_url: None,
        external_object_id: None,
        blob_content: None,
        legacy_path: Some(legacy_path.to_string()),
        size_bytes: 0,
        mime_type: "application/pdf".to_string(),
        download_count: 0,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_config(legacy_root: &Path) -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        s3: None,
        legacy_upload_root: legacy_root.to_path_buf(),
        max_upload_bytes: 64 * 1024,
        external_store_timeout: Duration::from_millis(200),
        cleanup_batch_size: 2,
        admin_token: Some(ADMIN_TOKEN.to_string()),
        port: 0,
        rust_log: "debug".to_string(),
    }
}

pub fn test_state(
    store: Arc<MemoryResumeStore>,
    object_store: Option<Arc<ScriptedObjectStore>>,
    legacy_root: &Path,
) -> AppState {
    AppState {
        resumes: store,
        object_store: object_store.map(|s| s as Arc<dyn ObjectStore>),
        legacy: LegacyFiles::new(legacy_root),
        config: test_config(legacy_root),
    }
}

#[derive(Default)]
pub struct MemoryResumeStore {
    rows: Mutex<BTreeMap<Uuid, ResumeRow>>,
    fail_increments: AtomicBool,
    fail_creates: AtomicBool,
}

impl MemoryResumeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, row: ResumeRow) {
        self.rows.lock().unwrap().insert(row.id, row);
    }

    pub fn get(&self, id: Uuid) -> Option<ResumeRow> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_increments.store(fail, Ordering::SeqCst);
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResumeStore for MemoryResumeStore {
    async fn create(&self, new: NewResume) -> Result<ResumeRow, StoreError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let (external_url, external_object_id, blob_content) = match new.storage {
            NewStorage::External { url, object_id } => (Some(url), Some(object_id), None),
            NewStorage::Embedded(bytes) => (None, None, Some(bytes.to_vec())),
        };
        let now = Utc::now();
        let row = ResumeRow {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            original_name: new.original_name,
            stored_name: new.stored_name,
            external_url,
            external_object_id,
            blob_content,
            legacy_path: None,
            size_bytes: new.size_bytes,
            mime_type: new.mime_type,
            download_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.insert(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(self.get(id))
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<ResumeRow>, StoreError> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn find_page(
        &self,
        filter: ResumeFilter,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ResumeRow>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| after.map_or(true, |a| r.id > a))
            .filter(|r| filter.matches(r))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn migrate_to_embedded(&self, id: Uuid, bytes: Bytes) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        row.size_bytes = bytes.len() as i64;
        row.blob_content = Some(bytes.to_vec());
        row.external_url = None;
        row.external_object_id = None;
        row.updated_at = Utc::now();
        Ok(())
    }

    async fn increment_download_count(&self, id: Uuid) -> Result<(), StoreError> {
        if self.fail_increments.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        row.download_count += 1;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn count(&self, filter: ResumeFilter) -> Result<i64, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| filter.matches(r))
            .count() as i64)
    }
}

/// How the scripted store answers uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadBehavior {
    Succeed,
    Fail,
    Hang,
}

pub struct ScriptedObjectStore {
    behavior: Mutex<UploadBehavior>,
    fail_deletes: AtomicBool,
    hang_deletes: AtomicBool,
    pub objects: Mutex<BTreeMap<String, Bytes>>,
    pub deleted: Mutex<Vec<String>>,
}

impl ScriptedObjectStore {
    pub fn new(behavior: UploadBehavior) -> Arc<Self> {
        Arc::new(ScriptedObjectStore {
            behavior: Mutex::new(behavior),
            fail_deletes: AtomicBool::new(false),
            hang_deletes: AtomicBool::new(false),
            objects: Mutex::new(BTreeMap::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn hang_deletes(&self, hang: bool) {
        self.hang_deletes.store(hang, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for ScriptedObjectStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> Result<StoredObject, ObjectStoreError> {
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            UploadBehavior::Succeed => {
                self.objects.lock().unwrap().insert(key.to_string(), bytes);
                Ok(StoredObject {
                    url: format!("https://objects.test/{key}"),
                    object_id: key.to_string(),
                })
            }
            UploadBehavior::Fail => Err(ObjectStoreError::Upload("connection refused".into())),
            UploadBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ObjectStoreError::Upload("unreachable".into()))
            }
        }
    }

    async fn delete(&self, object_id: &str) -> Result<(), ObjectStoreError> {
        if self.hang_deletes.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Delete("bucket offline".into()));
        }
        self.objects.lock().unwrap().remove(object_id);
        self.deleted.lock().unwrap().push(object_id.to_string());
        Ok(())
    }
}

//! Persistent resume records.
//!
//! `ResumeStore` is the seam between the services and PostgreSQL so the
//! upload, delivery and cleanup logic can run against an in-memory store in
//! tests. The SQL predicates below must agree with [`ResumeFilter::matches`].

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::resume::{NewResume, NewStorage, ResumeFilter, ResumeRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resume {0} not found")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn create(&self, new: NewResume) -> Result<ResumeRow, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError>;

    /// Newest first.
    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<ResumeRow>, StoreError>;

    /// Keyset page of records matching `filter`, ordered by id, strictly after `after`.
    async fn find_page(
        &self,
        filter: ResumeFilter,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ResumeRow>, StoreError>;

    /// Stores `bytes` in-record and drops any placeholder external pointer.
    /// `legacy_path` is kept for audit. Fails with `NotFound` if the row is gone.
    async fn migrate_to_embedded(&self, id: Uuid, bytes: Bytes) -> Result<(), StoreError>;

    /// Atomic `download_count + 1`. Fails with `NotFound` if the row is gone.
    async fn increment_download_count(&self, id: Uuid) -> Result<(), StoreError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn count(&self, filter: ResumeFilter) -> Result<i64, StoreError>;
}

const EXTERNAL_SQL: &str =
    "(external_url IS NOT NULL AND (btrim(external_url) LIKE 'https://%' OR btrim(external_url) LIKE 'http://%'))";
const EMBEDDED_SQL: &str = "(blob_content IS NOT NULL AND octet_length(blob_content) > 0)";
const LEGACY_SQL: &str = "(legacy_path IS NOT NULL AND btrim(legacy_path) <> '')";

fn filter_sql(filter: ResumeFilter) -> String {
    match filter {
        ResumeFilter::All => "TRUE".to_string(),
        ResumeFilter::External => EXTERNAL_SQL.to_string(),
        ResumeFilter::Embedded => format!("NOT {EXTERNAL_SQL} AND {EMBEDDED_SQL}"),
        ResumeFilter::Broken => {
            format!("NOT {EXTERNAL_SQL} AND NOT {EMBEDDED_SQL} AND {LEGACY_SQL}")
        }
        ResumeFilter::Unresolvable => {
            format!("NOT {EXTERNAL_SQL} AND NOT {EMBEDDED_SQL} AND NOT {LEGACY_SQL}")
        }
    }
}

#[derive(Clone)]
pub struct PgResumeStore {
    pool: PgPool,
}

impl PgResumeStore {
    pub fn new(pool: PgPool) -> Self {
        PgResumeStore { pool }
    }
}

#[async_trait]
impl ResumeStore for PgResumeStore {
    async fn create(&self, new: NewResume) -> Result<ResumeRow, StoreError> {
        let (external_url, external_object_id, blob_content) = match new.storage {
            NewStorage::External { url, object_id } => (Some(url), Some(object_id), None),
            NewStorage::Embedded(bytes) => (None, None, Some(bytes.to_vec())),
        };

        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            INSERT INTO resumes
                (id, owner_id, title, description, original_name, stored_name,
                 external_url, external_object_id, blob_content, legacy_path,
                 size_bytes, mime_type, download_count)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NULL, $10, $11, 0)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.owner_id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.original_name)
        .bind(&new.stored_name)
        .bind(external_url)
        .bind(external_object_id)
        .bind(blob_content)
        .bind(new.size_bytes)
        .bind(&new.mime_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResumeRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ResumeRow>("SELECT * FROM resumes WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<ResumeRow>, StoreError> {
        Ok(sqlx::query_as::<_, ResumeRow>(
            "SELECT * FROM resumes WHERE owner_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_page(
        &self,
        filter: ResumeFilter,
        after: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ResumeRow>, StoreError> {
        let sql = format!(
            "SELECT * FROM resumes WHERE {} AND ($1::uuid IS NULL OR id > $1) ORDER BY id LIMIT $2",
            filter_sql(filter)
        );
        Ok(sqlx::query_as::<_, ResumeRow>(&sql)
            .bind(after)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn migrate_to_embedded(&self, id: Uuid, bytes: Bytes) -> Result<(), StoreError> {
        let size = bytes.len() as i64;
        let result = sqlx::query(
            r#"
            UPDATE resumes
            SET blob_content = $2,
                size_bytes = $3,
                external_url = NULL,
                external_object_id = NULL,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(bytes.to_vec())
        .bind(size)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn increment_download_count(&self, id: Uuid) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE resumes SET download_count = download_count + 1 WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: ResumeFilter) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM resumes WHERE {}", filter_sql(filter));
        Ok(sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await?)
    }
}

/// SQLite-backed metadata store
use crate::{
    error::{VaultError, VaultResult},
    metadata::{FileRecord, FileStatus, MetadataStore, NewFileRecord},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use uuid::Uuid;

/// Metadata store over the `files` table
#[derive(Clone)]
pub struct SqliteMetadataStore {
    db: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn record_from_row(row: &SqliteRow) -> VaultResult<FileRecord> {
        let id: String = row.try_get("id")?;
        let status: String = row.try_get("status")?;

        Ok(FileRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| VaultError::Internal(format!("Corrupt file id '{}': {}", id, e)))?,
            storage_key: row.try_get("filename")?,
            user_filename: row.try_get("user_filename")?,
            content_type: row.try_get("content_type")?,
            owner: row.try_get("owner")?,
            status: status.parse().map_err(VaultError::Internal)?,
            metadata: row.try_get("metadata")?,
            location: row.try_get("location")?,
            created_at: row.try_get("created_at")?,
            last_modified_at: row.try_get("last_modified_at")?,
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create(&self, record: NewFileRecord) -> VaultResult<Option<Uuid>> {
        tracing::info!(filename = %record.user_filename, "Creating pending file record");

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO files (id, filename, user_filename, content_type, owner, status, metadata, created_at, last_modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.storage_key)
        .bind(&record.user_filename)
        .bind(&record.content_type)
        .bind(&record.owner)
        .bind(FileStatus::Pending.as_str())
        .bind(&record.metadata)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id")?;
                let id = Uuid::parse_str(&id)
                    .map_err(|e| VaultError::Internal(format!("Corrupt file id '{}': {}", id, e)))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    async fn mark_available(&self, id: Uuid, location: &str) -> VaultResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE files
            SET location = ?1, status = ?2, last_modified_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(location)
        .bind(FileStatus::Available.as_str())
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_by_id_and_owner(
        &self,
        id: Uuid,
        owner: Option<&str>,
    ) -> VaultResult<Option<FileRecord>> {
        // `IS` so an anonymous lookup only matches NULL owners
        let row = sqlx::query(
            r#"
            SELECT id, filename, user_filename, content_type, owner, status, metadata, location, created_at, last_modified_at
            FROM files
            WHERE id = ?1 AND owner IS ?2
            "#,
        )
        .bind(id.to_string())
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }
}

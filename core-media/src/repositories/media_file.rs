//! Media file repository trait and implementation

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{MediaError, Result};
use crate::models::{MediaFile, MediaFileRow, StorageBackend, TransferStatus};
use crate::repositories::{Page, PageRequest};

/// Media file data access
#[async_trait]
pub trait MediaFileRepository: Send + Sync {
    async fn insert(&self, media: &MediaFile) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaFile>>;

    /// Look a record up by its remote provider id.
    async fn find_by_drive_file_id(&self, drive_file_id: &str) -> Result<Option<MediaFile>>;

    /// Overwrite every mutable column of an existing record.
    ///
    /// # Errors
    /// [`MediaError::NotFound`] when no row has `media.id`.
    async fn update(&self, media: &MediaFile) -> Result<()>;

    /// Delete a record; slots and event links go with it.
    ///
    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Newest first.
    async fn list(&self, request: PageRequest) -> Result<Page<MediaFile>>;

    /// Point the records of `drive_file_id` at their object storage copy.
    ///
    /// Keyed by the remote provider id rather than the record id. Returns the
    /// number of rows updated; zero means no record references that file.
    async fn mark_transferred(
        &self,
        drive_file_id: &str,
        storage_path: &str,
        public_url: &str,
    ) -> Result<u64>;

    /// Forget the object storage copy and point back at the remote provider.
    ///
    /// # Errors
    /// [`MediaError::NotFound`] when no row has `media_id`.
    async fn reset_transfer(&self, media_id: &str) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of [`MediaFileRepository`]
pub struct SqliteMediaFileRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteMediaFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    fn validate(media: &MediaFile) -> Result<()> {
        media
            .validate()
            .map_err(|msg| MediaError::invalid("MediaFile", msg))
    }
}

impl SqliteMediaFileRepository {
    /// A remote file may be catalogued once.
    fn map_duplicate(e: sqlx::Error, media: &MediaFile) -> MediaError {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MediaError::invalid(
                "drive_file_id",
                format!(
                    "{} is already catalogued",
                    media.drive_file_id.as_deref().unwrap_or_default()
                ),
            ),
            other => other.into(),
        }
    }
}

#[async_trait]
impl MediaFileRepository for SqliteMediaFileRepository {
    #[instrument(skip(self, media), fields(media_id = %media.id))]
    async fn insert(&self, media: &MediaFile) -> Result<()> {
        Self::validate(media)?;

        sqlx::query(
            r#"
            INSERT INTO media_files (
                id, name, mime_type, file_size, drive_file_id, drive_url, download_url,
                thumbnail_url, storage_backend, transfer_status, storage_path, uploaded_by,
                is_public, is_archived, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&media.id)
        .bind(&media.name)
        .bind(&media.mime_type)
        .bind(media.file_size as i64)
        .bind(&media.drive_file_id)
        .bind(&media.drive_url)
        .bind(&media.download_url)
        .bind(&media.thumbnail_url)
        .bind(media.storage_backend.as_str())
        .bind(media.transfer_status.as_str())
        .bind(&media.storage_path)
        .bind(&media.uploaded_by)
        .bind(media.is_public)
        .bind(media.is_archived)
        .bind(media.created_at)
        .bind(media.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_duplicate(e, media))?;

        debug!("Inserted media file");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaFile>> {
        sqlx::query_as::<_, MediaFileRow>("SELECT * FROM media_files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(MediaFile::try_from)
            .transpose()
    }

    async fn find_by_drive_file_id(&self, drive_file_id: &str) -> Result<Option<MediaFile>> {
        sqlx::query_as::<_, MediaFileRow>(
            "SELECT * FROM media_files WHERE drive_file_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(drive_file_id)
        .fetch_optional(&self.pool)
        .await?
        .map(MediaFile::try_from)
        .transpose()
    }

    async fn update(&self, media: &MediaFile) -> Result<()> {
        Self::validate(media)?;

        let affected = sqlx::query(
            r#"
            UPDATE media_files
            SET name = ?, mime_type = ?, file_size = ?, drive_file_id = ?, drive_url = ?,
                download_url = ?, thumbnail_url = ?, storage_backend = ?, transfer_status = ?,
                storage_path = ?, uploaded_by = ?, is_public = ?, is_archived = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&media.name)
        .bind(&media.mime_type)
        .bind(media.file_size as i64)
        .bind(&media.drive_file_id)
        .bind(&media.drive_url)
        .bind(&media.download_url)
        .bind(&media.thumbnail_url)
        .bind(media.storage_backend.as_str())
        .bind(media.transfer_status.as_str())
        .bind(&media.storage_path)
        .bind(&media.uploaded_by)
        .bind(media.is_public)
        .bind(media.is_archived)
        .bind(self.clock.unix_timestamp())
        .bind(&media.id)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_duplicate(e, media))?
        .rows_affected();

        if affected == 0 {
            return Err(MediaError::not_found("MediaFile", &media.id));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM media_files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list(&self, request: PageRequest) -> Result<Page<MediaFile>> {
        let total = self.count().await?;
        let rows = sqlx::query_as::<_, MediaFileRow>(
            "SELECT * FROM media_files ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
        )
        .bind(request.limit())
        .bind(request.offset())
        .fetch_all(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(MediaFile::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total as u64, request))
    }

    #[instrument(skip(self, public_url))]
    async fn mark_transferred(
        &self,
        drive_file_id: &str,
        storage_path: &str,
        public_url: &str,
    ) -> Result<u64> {
        let affected = sqlx::query(
            r#"
            UPDATE media_files
            SET download_url = ?, storage_path = ?, storage_backend = ?, transfer_status = ?,
                updated_at = ?
            WHERE drive_file_id = ?
            "#,
        )
        .bind(public_url)
        .bind(storage_path)
        .bind(StorageBackend::Hybrid.as_str())
        .bind(TransferStatus::Completed.as_str())
        .bind(self.clock.unix_timestamp())
        .bind(drive_file_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        debug!(rows = affected, "Marked media as transferred");
        Ok(affected)
    }

    async fn reset_transfer(&self, media_id: &str) -> Result<()> {
        let affected = sqlx::query(
            r#"
            UPDATE media_files
            SET download_url = COALESCE(drive_url, download_url), storage_path = NULL,
                storage_backend = ?, transfer_status = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(StorageBackend::DriveOnly.as_str())
        .bind(TransferStatus::Pending.as_str())
        .bind(self.clock.unix_timestamp())
        .bind(media_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(MediaError::not_found("MediaFile", media_id));
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM media_files")
            .fetch_one(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn drive_media(drive_id: &str, created_at: i64) -> MediaFile {
        MediaFile::drive_only(
            drive_id,
            format!("{}.jpg", drive_id),
            "image/jpeg",
            2_097_152,
            format!("https://drive.google.com/uc?export=view&id={}", drive_id),
            created_at,
        )
    }

    async fn repo() -> SqliteMediaFileRepository {
        SqliteMediaFileRepository::new(create_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let repo = repo().await;
        let media = drive_media("abc123", 100);
        repo.insert(&media).await.unwrap();

        let found = repo.find_by_id(&media.id).await.unwrap().unwrap();
        assert_eq!(found, media);

        let by_drive = repo.find_by_drive_file_id("abc123").await.unwrap().unwrap();
        assert_eq!(by_drive.id, media.id);
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_rejects_invalid() {
        let repo = repo().await;
        let mut media = drive_media("abc123", 100);
        media.name = "  ".to_string();

        assert!(matches!(
            repo.insert(&media).await,
            Err(MediaError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_transferred_and_reset() {
        let repo = repo().await;
        let media = drive_media("abc123", 100);
        repo.insert(&media).await.unwrap();

        let rows = repo
            .mark_transferred(
                "abc123",
                "gallery_image/1-abc123.jpg",
                "https://cdn/gallery_image/1-abc123.jpg",
            )
            .await
            .unwrap();
        assert_eq!(rows, 1);

        let moved = repo.find_by_id(&media.id).await.unwrap().unwrap();
        assert_eq!(moved.transfer_status, TransferStatus::Completed);
        assert_eq!(moved.storage_backend, StorageBackend::Hybrid);
        assert_eq!(moved.canonical_url(), "https://cdn/gallery_image/1-abc123.jpg");
        assert_eq!(moved.storage_path.as_deref(), Some("gallery_image/1-abc123.jpg"));

        repo.reset_transfer(&media.id).await.unwrap();
        let reset = repo.find_by_id(&media.id).await.unwrap().unwrap();
        assert_eq!(reset.transfer_status, TransferStatus::Pending);
        assert!(reset.storage_path.is_none());
        assert_eq!(reset.download_url, media.download_url);
    }

    #[tokio::test]
    async fn test_second_record_for_drive_file_rejected() {
        let repo = repo().await;
        repo.insert(&drive_media("dup", 100)).await.unwrap();

        let err = repo.insert(&drive_media("dup", 200)).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput { ref field, .. } if field == "drive_file_id"));
        assert_eq!(repo.count().await.unwrap(), 1);

        let mut other = drive_media("other", 300);
        repo.insert(&other).await.unwrap();
        other.drive_file_id = Some("dup".into());
        assert!(matches!(
            repo.update(&other).await,
            Err(MediaError::InvalidInput { .. })
        ));
    }

    #[tokio::test]
    async fn test_mark_transferred_unknown_drive_id_matches_nothing() {
        let repo = repo().await;
        let rows = repo.mark_transferred("nope", "a/b", "https://x").await.unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = repo().await;
        let mut media = drive_media("abc123", 100);
        repo.insert(&media).await.unwrap();

        media.is_archived = true;
        media.thumbnail_url = Some("https://thumb".into());
        repo.update(&media).await.unwrap();

        let found = repo.find_by_id(&media.id).await.unwrap().unwrap();
        assert!(found.is_archived);
        assert_eq!(found.thumbnail_url.as_deref(), Some("https://thumb"));

        assert!(repo.delete(&media.id).await.unwrap());
        assert!(!repo.delete(&media.id).await.unwrap());
        assert!(matches!(
            repo.update(&media).await,
            Err(MediaError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = repo().await;
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            repo.insert(&drive_media(id, i as i64)).await.unwrap();
        }

        let page = repo.list(PageRequest::first(2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        let names: Vec<_> = page.items.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["c.jpg", "b.jpg"]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}

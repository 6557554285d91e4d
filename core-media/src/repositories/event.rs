//! Event media links and provisioned event folders

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::debug;

use crate::error::{MediaError, Result};
use crate::models::{EventFolder, EventMediaLink};

/// Event to media associations
#[async_trait]
pub trait EventMediaRepository: Send + Sync {
    /// Attach a media file to an event after its existing media.
    ///
    /// # Errors
    /// [`MediaError::InvalidInput`] if the pair is already linked.
    async fn link(
        &self,
        event_id: &str,
        media_file_id: &str,
        is_featured: bool,
    ) -> Result<EventMediaLink>;

    async fn unlink(&self, event_id: &str, media_file_id: &str) -> Result<bool>;

    /// Ascending display order.
    async fn list_for_event(&self, event_id: &str) -> Result<Vec<EventMediaLink>>;

    async fn set_featured(&self, event_id: &str, media_file_id: &str, featured: bool)
        -> Result<()>;
}

/// Drive folders already provisioned per event
#[async_trait]
pub trait EventFolderRepository: Send + Sync {
    async fn insert(&self, folder: &EventFolder) -> Result<()>;

    async fn find_by_event(&self, event_id: &str) -> Result<Option<EventFolder>>;
}

/// SQLite implementation of [`EventMediaRepository`]
pub struct SqliteEventMediaRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteEventMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl EventMediaRepository for SqliteEventMediaRepository {
    async fn link(
        &self,
        event_id: &str,
        media_file_id: &str,
        is_featured: bool,
    ) -> Result<EventMediaLink> {
        let mut tx = self.pool.begin().await?;

        let next_order: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(display_order) + 1, 0) FROM event_media WHERE event_id = ?",
        )
        .bind(event_id)
        .fetch_one(&mut *tx)
        .await?;

        let link = EventMediaLink::new(
            event_id,
            media_file_id,
            next_order,
            is_featured,
            self.clock.unix_timestamp(),
        );

        sqlx::query(
            r#"
            INSERT INTO event_media (id, event_id, media_file_id, display_order, is_featured, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.id)
        .bind(&link.event_id)
        .bind(&link.media_file_id)
        .bind(link.display_order)
        .bind(link.is_featured)
        .bind(link.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MediaError::invalid(
                "media_file_id",
                format!("{} is already linked to event {}", media_file_id, event_id),
            ),
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                MediaError::not_found("MediaFile", media_file_id)
            }
            other => other.into(),
        })?;

        tx.commit().await?;
        debug!(event_id, media_file_id, "Linked media to event");
        Ok(link)
    }

    async fn unlink(&self, event_id: &str, media_file_id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM event_media WHERE event_id = ? AND media_file_id = ?")
            .bind(event_id)
            .bind(media_file_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn list_for_event(&self, event_id: &str) -> Result<Vec<EventMediaLink>> {
        Ok(sqlx::query_as::<_, EventMediaLink>(
            "SELECT * FROM event_media WHERE event_id = ? ORDER BY display_order, created_at",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_featured(
        &self,
        event_id: &str,
        media_file_id: &str,
        featured: bool,
    ) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE event_media SET is_featured = ? WHERE event_id = ? AND media_file_id = ?",
        )
        .bind(featured)
        .bind(event_id)
        .bind(media_file_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(MediaError::not_found(
                "EventMediaLink",
                format!("{}/{}", event_id, media_file_id),
            ));
        }
        Ok(())
    }
}

/// SQLite implementation of [`EventFolderRepository`]
pub struct SqliteEventFolderRepository {
    pool: SqlitePool,
}

impl SqliteEventFolderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventFolderRepository for SqliteEventFolderRepository {
    async fn insert(&self, folder: &EventFolder) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_folders (
                id, event_id, event_name, drive_folder_id, photos_folder_id, videos_folder_id,
                folder_url, photos_url, videos_url, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&folder.id)
        .bind(&folder.event_id)
        .bind(&folder.event_name)
        .bind(&folder.drive_folder_id)
        .bind(&folder.photos_folder_id)
        .bind(&folder.videos_folder_id)
        .bind(&folder.folder_url)
        .bind(&folder.photos_url)
        .bind(&folder.videos_url)
        .bind(folder.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MediaError::invalid(
                "event_id",
                format!("event {} already has folders", folder.event_id),
            ),
            other => other.into(),
        })?;
        Ok(())
    }

    async fn find_by_event(&self, event_id: &str) -> Result<Option<EventFolder>> {
        Ok(
            sqlx::query_as::<_, EventFolder>("SELECT * FROM event_folders WHERE event_id = ?")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;
    use crate::models::MediaFile;
    use crate::repositories::{MediaFileRepository, SqliteMediaFileRepository};
    use bridge_traits::storage::EventFolderLinks;

    async fn seeded() -> (SqlitePool, Vec<String>) {
        let pool = create_test_pool().await.unwrap();
        let media_repo = SqliteMediaFileRepository::new(pool.clone());
        let mut ids = Vec::new();
        for name in ["one", "two"] {
            let media = MediaFile::drive_only(name, name, "image/png", 1, "https://drive", 0);
            media_repo.insert(&media).await.unwrap();
            ids.push(media.id);
        }
        (pool, ids)
    }

    #[tokio::test]
    async fn test_link_orders_and_lists() {
        let (pool, ids) = seeded().await;
        let repo = SqliteEventMediaRepository::new(pool);

        let first = repo.link("evt-1", &ids[0], false).await.unwrap();
        let second = repo.link("evt-1", &ids[1], true).await.unwrap();
        assert_eq!(first.display_order, 0);
        assert_eq!(second.display_order, 1);

        let listed = repo.list_for_event("evt-1").await.unwrap();
        assert_eq!(listed, vec![first, second]);
        assert!(repo.list_for_event("evt-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_and_unknown_links() {
        let (pool, ids) = seeded().await;
        let repo = SqliteEventMediaRepository::new(pool);

        repo.link("evt-1", &ids[0], false).await.unwrap();
        assert!(matches!(
            repo.link("evt-1", &ids[0], false).await,
            Err(MediaError::InvalidInput { .. })
        ));
        assert!(matches!(
            repo.link("evt-1", "missing", false).await,
            Err(MediaError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_featured_and_unlink() {
        let (pool, ids) = seeded().await;
        let repo = SqliteEventMediaRepository::new(pool);
        repo.link("evt-1", &ids[0], false).await.unwrap();

        repo.set_featured("evt-1", &ids[0], true).await.unwrap();
        assert!(repo.list_for_event("evt-1").await.unwrap()[0].is_featured);

        assert!(repo.unlink("evt-1", &ids[0]).await.unwrap());
        assert!(!repo.unlink("evt-1", &ids[0]).await.unwrap());
        assert!(repo.set_featured("evt-1", &ids[0], true).await.is_err());
    }

    #[tokio::test]
    async fn test_event_folder_round_trip() {
        let pool = create_test_pool().await.unwrap();
        let repo = SqliteEventFolderRepository::new(pool);
        let links = EventFolderLinks {
            folder_id: "f".into(),
            photos_folder_id: "p".into(),
            videos_folder_id: "v".into(),
            folder_url: "https://drive/f".into(),
            photos_url: "https://drive/p".into(),
            videos_url: "https://drive/v".into(),
        };
        let folder = EventFolder::from_links("evt-9", "Gala", links, 42);

        assert!(repo.find_by_event("evt-9").await.unwrap().is_none());
        repo.insert(&folder).await.unwrap();
        assert_eq!(repo.find_by_event("evt-9").await.unwrap(), Some(folder.clone()));
        assert!(repo.insert(&folder).await.is_err());
    }
}

//! Homepage slot repository
//!
//! Every write that can activate a slot in an exclusive category runs inside
//! one transaction that first deactivates the siblings. Callers never
//! sequence the two steps themselves.

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::error::{MediaError, Result};
use crate::models::{
    CleanupCandidate, HomepageMediaSlot, HomepageSlotRow, MediaCategory, NewHomepageSlot,
    StorageUsageRow,
};

/// Homepage slot data access
#[async_trait]
pub trait HomepageMediaRepository: Send + Sync {
    /// Insert a slot. Without an explicit display order the slot goes after
    /// the last one of its category.
    async fn insert(&self, slot: NewHomepageSlot) -> Result<HomepageMediaSlot>;

    async fn find_by_id(&self, id: &str) -> Result<Option<HomepageMediaSlot>>;

    /// Ascending display order.
    async fn list_by_category(&self, category: MediaCategory) -> Result<Vec<HomepageMediaSlot>>;

    /// Active slots of every category, grouped by category.
    async fn list_active(&self) -> Result<Vec<HomepageMediaSlot>>;

    /// All slots that reference `media_file_id`.
    async fn list_for_media(&self, media_file_id: &str) -> Result<Vec<HomepageMediaSlot>>;

    /// Write presentation fields, display order and the active flag.
    async fn update(&self, slot: &HomepageMediaSlot) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Toggle a slot, keeping exclusive categories to one active slot.
    async fn set_active(&self, slot_id: &str, active: bool) -> Result<HomepageMediaSlot>;

    /// Make the background video slot of `media_file_id` the only active one.
    ///
    /// # Errors
    /// [`MediaError::NotFound`] if the media has no background video slot.
    async fn set_active_background_video(&self, media_file_id: &str) -> Result<HomepageMediaSlot>;

    /// Renumber a category so `ids` appear in the given order.
    ///
    /// `ids` must list every slot of the category exactly once.
    async fn reorder(&self, category: MediaCategory, ids: &[String]) -> Result<()>;

    /// Transferred media whose slots are all inactive.
    async fn find_inactive_transferred(&self) -> Result<Vec<CleanupCandidate>>;

    /// Transferred media referenced by any slot, one row per media file.
    async fn storage_usage_rows(&self) -> Result<Vec<StorageUsageRow>>;
}

/// SQLite implementation of [`HomepageMediaRepository`]
pub struct SqliteHomepageMediaRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

#[derive(FromRow)]
struct CandidateRow {
    slot_id: String,
    media_file_id: String,
    storage_path: String,
    drive_url: Option<String>,
    file_size: i64,
}

#[derive(FromRow)]
struct UsageRow {
    media_file_id: String,
    category: String,
    file_size: i64,
}

impl SqliteHomepageMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn fetch_in(
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> Result<Option<HomepageMediaSlot>> {
        sqlx::query_as::<_, HomepageSlotRow>("SELECT * FROM homepage_media WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .map(HomepageMediaSlot::try_from)
            .transpose()
    }

    /// Deactivate every active slot of `category` except `keep_id`.
    async fn deactivate_siblings(
        tx: &mut Transaction<'_, Sqlite>,
        category: MediaCategory,
        keep_id: &str,
        now: i64,
    ) -> Result<u64> {
        let affected = sqlx::query(
            r#"
            UPDATE homepage_media
            SET is_active = 0, updated_at = ?
            WHERE category = ? AND is_active = 1 AND id != ?
            "#,
        )
        .bind(now)
        .bind(category.as_str())
        .bind(keep_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        Ok(affected)
    }

    async fn activate_in(
        tx: &mut Transaction<'_, Sqlite>,
        slot: &HomepageMediaSlot,
        active: bool,
        now: i64,
    ) -> Result<()> {
        if active && slot.category.is_exclusive() {
            let deactivated = Self::deactivate_siblings(tx, slot.category, &slot.id, now).await?;
            if deactivated > 0 {
                debug!(
                    category = %slot.category,
                    deactivated,
                    "Deactivated sibling slots"
                );
            }
        }

        sqlx::query("UPDATE homepage_media SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(&slot.id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    fn collect(rows: Vec<HomepageSlotRow>) -> Result<Vec<HomepageMediaSlot>> {
        rows.into_iter().map(HomepageMediaSlot::try_from).collect()
    }
}

#[async_trait]
impl HomepageMediaRepository for SqliteHomepageMediaRepository {
    #[instrument(skip(self, slot), fields(category = %slot.category))]
    async fn insert(&self, slot: NewHomepageSlot) -> Result<HomepageMediaSlot> {
        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let display_order = match slot.options.display_order {
            Some(order) => order,
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COALESCE(MAX(display_order) + 1, 0) FROM homepage_media WHERE category = ?",
                )
                .bind(slot.category.as_str())
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let stored = HomepageMediaSlot {
            id: Uuid::new_v4().to_string(),
            media_file_id: slot.media_file_id,
            category: slot.category,
            display_order,
            is_active: !slot.options.inactive,
            title: slot.options.title,
            description: slot.options.description,
            link_url: slot.options.link_url,
            created_at: now,
            updated_at: now,
        };

        if stored.is_active && stored.category.is_exclusive() {
            Self::deactivate_siblings(&mut tx, stored.category, &stored.id, now).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO homepage_media (
                id, media_file_id, category, display_order, is_active, title, description,
                link_url, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&stored.id)
        .bind(&stored.media_file_id)
        .bind(stored.category.as_str())
        .bind(stored.display_order)
        .bind(stored.is_active)
        .bind(&stored.title)
        .bind(&stored.description)
        .bind(&stored.link_url)
        .bind(stored.created_at)
        .bind(stored.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MediaError::invalid(
                "display_order",
                format!("{} already used in {}", stored.display_order, stored.category),
            ),
            other => other.into(),
        })?;

        tx.commit().await?;
        debug!(slot_id = %stored.id, "Inserted homepage slot");
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<HomepageMediaSlot>> {
        sqlx::query_as::<_, HomepageSlotRow>("SELECT * FROM homepage_media WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(HomepageMediaSlot::try_from)
            .transpose()
    }

    async fn list_by_category(&self, category: MediaCategory) -> Result<Vec<HomepageMediaSlot>> {
        let rows = sqlx::query_as::<_, HomepageSlotRow>(
            "SELECT * FROM homepage_media WHERE category = ? ORDER BY display_order ASC",
        )
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Self::collect(rows)
    }

    async fn list_active(&self) -> Result<Vec<HomepageMediaSlot>> {
        let rows = sqlx::query_as::<_, HomepageSlotRow>(
            "SELECT * FROM homepage_media WHERE is_active = 1 ORDER BY category, display_order",
        )
        .fetch_all(&self.pool)
        .await?;
        Self::collect(rows)
    }

    async fn list_for_media(&self, media_file_id: &str) -> Result<Vec<HomepageMediaSlot>> {
        let rows = sqlx::query_as::<_, HomepageSlotRow>(
            "SELECT * FROM homepage_media WHERE media_file_id = ? ORDER BY created_at",
        )
        .bind(media_file_id)
        .fetch_all(&self.pool)
        .await?;
        Self::collect(rows)
    }

    async fn update(&self, slot: &HomepageMediaSlot) -> Result<()> {
        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            r#"
            UPDATE homepage_media
            SET display_order = ?, title = ?, description = ?, link_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(slot.display_order)
        .bind(&slot.title)
        .bind(&slot.description)
        .bind(&slot.link_url)
        .bind(now)
        .bind(&slot.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => MediaError::invalid(
                "display_order",
                format!("{} already used in {}", slot.display_order, slot.category),
            ),
            other => other.into(),
        })?
        .rows_affected();

        if affected == 0 {
            return Err(MediaError::not_found("HomepageMediaSlot", &slot.id));
        }

        Self::activate_in(&mut tx, slot, slot.is_active, now).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM homepage_media WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    #[instrument(skip(self))]
    async fn set_active(&self, slot_id: &str, active: bool) -> Result<HomepageMediaSlot> {
        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let mut slot = Self::fetch_in(&mut tx, slot_id)
            .await?
            .ok_or_else(|| MediaError::not_found("HomepageMediaSlot", slot_id))?;

        Self::activate_in(&mut tx, &slot, active, now).await?;
        tx.commit().await?;

        slot.is_active = active;
        slot.updated_at = now;
        Ok(slot)
    }

    #[instrument(skip(self))]
    async fn set_active_background_video(&self, media_file_id: &str) -> Result<HomepageMediaSlot> {
        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let mut slot = sqlx::query_as::<_, HomepageSlotRow>(
            r#"
            SELECT * FROM homepage_media
            WHERE media_file_id = ? AND category = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(media_file_id)
        .bind(MediaCategory::BackgroundVideo.as_str())
        .fetch_optional(&mut *tx)
        .await?
        .map(HomepageMediaSlot::try_from)
        .transpose()?
        .ok_or_else(|| MediaError::not_found("BackgroundVideoSlot", media_file_id))?;

        Self::activate_in(&mut tx, &slot, true, now).await?;
        tx.commit().await?;

        info!(slot_id = %slot.id, "Background video activated");
        slot.is_active = true;
        slot.updated_at = now;
        Ok(slot)
    }

    async fn reorder(&self, category: MediaCategory, ids: &[String]) -> Result<()> {
        let now = self.clock.unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let existing: Vec<String> =
            sqlx::query_scalar("SELECT id FROM homepage_media WHERE category = ?")
                .bind(category.as_str())
                .fetch_all(&mut *tx)
                .await?;

        let mut requested: Vec<&str> = ids.iter().map(String::as_str).collect();
        requested.sort_unstable();
        requested.dedup();
        let mut current: Vec<&str> = existing.iter().map(String::as_str).collect();
        current.sort_unstable();
        if requested.len() != ids.len() || requested != current {
            return Err(MediaError::invalid(
                "ids",
                format!("must list every {} slot exactly once", category),
            ));
        }

        // Move everything out of the way first; (category, display_order) is unique.
        for (index, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE homepage_media SET display_order = ? WHERE id = ?")
                .bind(-(index as i64) - 1)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        for (index, id) in ids.iter().enumerate() {
            sqlx::query("UPDATE homepage_media SET display_order = ?, updated_at = ? WHERE id = ?")
                .bind(index as i64)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_inactive_transferred(&self) -> Result<Vec<CleanupCandidate>> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT MIN(h.id) AS slot_id, m.id AS media_file_id, m.storage_path AS storage_path,
                   m.drive_url AS drive_url, m.file_size AS file_size
            FROM homepage_media h
            JOIN media_files m ON m.id = h.media_file_id
            WHERE h.is_active = 0
              AND m.storage_path IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM homepage_media a
                  JOIN media_files s ON s.id = a.media_file_id
                  WHERE a.is_active = 1
                    AND (s.id = m.id OR s.storage_path = m.storage_path)
              )
            GROUP BY m.id
            ORDER BY m.created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CleanupCandidate {
                slot_id: row.slot_id,
                media_file_id: row.media_file_id,
                storage_path: row.storage_path,
                drive_url: row.drive_url,
                file_size: row.file_size.max(0) as u64,
            })
            .collect())
    }

    async fn storage_usage_rows(&self) -> Result<Vec<StorageUsageRow>> {
        let rows = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT m.id AS media_file_id, MIN(h.category) AS category, m.file_size AS file_size
            FROM homepage_media h
            JOIN media_files m ON m.id = h.media_file_id
            WHERE m.storage_path IS NOT NULL
            GROUP BY m.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let category = row.category.parse().map_err(|e: MediaError| {
                    MediaError::CorruptedRow {
                        table: "homepage_media".to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(StorageUsageRow {
                    media_file_id: row.media_file_id,
                    category,
                    file_size: row.file_size.max(0) as u64,
                })
            })
            .collect()
    }
}

//! # Media Catalog
//!
//! SQLite-backed metadata store for media files and where they are shown:
//! homepage slots, event pages and provisioned event folders.
//!
//! ```rust,ignore
//! use core_media::db::{create_pool, DatabaseConfig};
//! use core_media::repositories::{HomepageMediaRepository, SqliteHomepageMediaRepository};
//!
//! let pool = create_pool(DatabaseConfig::new("media.db")).await?;
//! let slots = SqliteHomepageMediaRepository::new(pool.clone());
//! slots.set_active_background_video(&media_id).await?;
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{MediaError, Result};
pub use models::{
    CleanupCandidate, EventFolder, EventMediaLink, HomepageMediaSlot, MediaCategory, MediaFile,
    NewHomepageSlot, SlotOptions, StorageBackend, StorageUsageRow, TransferStatus,
};
pub use repositories::{
    EventFolderRepository, EventMediaRepository, HomepageMediaRepository, MediaFileRepository,
    Page, PageRequest, SqliteEventFolderRepository, SqliteEventMediaRepository,
    SqliteHomepageMediaRepository, SqliteMediaFileRepository,
};

//! Domain models for the media catalog
//!
//! Enumerations are stored as snake_case text. Rows are read into plain
//! `FromRow` structs and converted with `TryFrom`, so a value the schema
//! allows but the code does not know surfaces as [`MediaError::CorruptedRow`].

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::MediaError;

// =============================================================================
// Enumerations
// =============================================================================

/// Where the bytes of a media file live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Only on the remote file provider.
    DriveOnly,
    /// Copied to object storage; the Drive original is kept.
    Hybrid,
}

/// Progress of the copy to object storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Completed,
}

/// Homepage display category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaCategory {
    BackgroundVideo,
    HeroImage,
    GalleryImage,
    Banner,
    Logo,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = MediaError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(MediaError::invalid(
                        stringify!($ty),
                        format!("unknown value '{}'", other),
                    )),
                }
            }
        }
    };
}

text_enum!(StorageBackend {
    DriveOnly => "drive_only",
    Hybrid => "hybrid",
});

text_enum!(TransferStatus {
    Pending => "pending",
    Completed => "completed",
});

text_enum!(MediaCategory {
    BackgroundVideo => "background_video",
    HeroImage => "hero_image",
    GalleryImage => "gallery_image",
    Banner => "banner",
    Logo => "logo",
});

impl MediaCategory {
    pub const ALL: [MediaCategory; 5] = [
        MediaCategory::BackgroundVideo,
        MediaCategory::HeroImage,
        MediaCategory::GalleryImage,
        MediaCategory::Banner,
        MediaCategory::Logo,
    ];

    /// Categories where only one slot may be active at a time.
    pub fn is_exclusive(&self) -> bool {
        matches!(self, MediaCategory::BackgroundVideo)
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn corrupted(table: &str, message: impl Into<String>) -> MediaError {
    MediaError::CorruptedRow {
        table: table.to_string(),
        message: message.into(),
    }
}

// =============================================================================
// MediaFile
// =============================================================================

/// Canonical record of one uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub file_size: u64,
    /// Remote provider id; cleared only if the Drive original is removed.
    pub drive_file_id: Option<String>,
    /// Public link on the remote provider.
    pub drive_url: Option<String>,
    /// URL clients load the asset from.
    pub download_url: String,
    pub thumbnail_url: Option<String>,
    pub storage_backend: StorageBackend,
    pub transfer_status: TransferStatus,
    /// Object storage path, present once transferred.
    pub storage_path: Option<String>,
    pub uploaded_by: Option<String>,
    pub is_public: bool,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl MediaFile {
    /// Record for a file that so far only exists on the remote provider.
    ///
    /// `drive_url` is the provider's public link and doubles as the download
    /// URL until the file is transferred.
    pub fn drive_only(
        drive_file_id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        file_size: u64,
        drive_url: impl Into<String>,
        now: i64,
    ) -> Self {
        let drive_url = drive_url.into();
        Self {
            id: new_id(),
            name: name.into(),
            mime_type: mime_type.into(),
            file_size,
            drive_file_id: Some(drive_file_id.into()),
            drive_url: Some(drive_url.clone()),
            download_url: drive_url,
            thumbnail_url: None,
            storage_backend: StorageBackend::DriveOnly,
            transfer_status: TransferStatus::Pending,
            storage_path: None,
            uploaded_by: None,
            is_public: true,
            is_archived: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_thumbnail(mut self, url: Option<String>) -> Self {
        self.thumbnail_url = url;
        self
    }

    pub fn with_uploaded_by(mut self, owner: Option<String>) -> Self {
        self.uploaded_by = owner;
        self
    }

    pub fn is_transferred(&self) -> bool {
        self.transfer_status == TransferStatus::Completed
    }

    /// The URL clients should load.
    ///
    /// For completed transfers this is the object storage URL, otherwise the
    /// remote provider link.
    pub fn canonical_url(&self) -> &str {
        &self.download_url
    }

    /// Check record consistency before writing.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Media name cannot be empty".to_string());
        }
        if self.mime_type.trim().is_empty() {
            return Err("MIME type cannot be empty".to_string());
        }
        if self.download_url.trim().is_empty() {
            return Err("Download URL cannot be empty".to_string());
        }
        if self.is_transferred() && self.storage_path.is_none() {
            return Err("Completed transfer requires a storage path".to_string());
        }
        if self.file_size > i64::MAX as u64 {
            return Err("File size out of range".to_string());
        }
        Ok(())
    }
}

/// Raw `media_files` row.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct MediaFileRow {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub file_size: i64,
    pub drive_file_id: Option<String>,
    pub drive_url: Option<String>,
    pub download_url: String,
    pub thumbnail_url: Option<String>,
    pub storage_backend: String,
    pub transfer_status: String,
    pub storage_path: Option<String>,
    pub uploaded_by: Option<String>,
    pub is_public: bool,
    pub is_archived: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<MediaFileRow> for MediaFile {
    type Error = MediaError;

    fn try_from(row: MediaFileRow) -> Result<Self, Self::Error> {
        let file_size = u64::try_from(row.file_size)
            .map_err(|_| corrupted("media_files", format!("negative size on {}", row.id)))?;
        let storage_backend = row
            .storage_backend
            .parse()
            .map_err(|e: MediaError| corrupted("media_files", e.to_string()))?;
        let transfer_status = row
            .transfer_status
            .parse()
            .map_err(|e: MediaError| corrupted("media_files", e.to_string()))?;

        Ok(Self {
            id: row.id,
            name: row.name,
            mime_type: row.mime_type,
            file_size,
            drive_file_id: row.drive_file_id,
            drive_url: row.drive_url,
            download_url: row.download_url,
            thumbnail_url: row.thumbnail_url,
            storage_backend,
            transfer_status,
            storage_path: row.storage_path,
            uploaded_by: row.uploaded_by,
            is_public: row.is_public,
            is_archived: row.is_archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// HomepageMediaSlot
// =============================================================================

/// Placement of a media file on the homepage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomepageMediaSlot {
    pub id: String,
    pub media_file_id: String,
    pub category: MediaCategory,
    /// Unique within the category, ascending.
    pub display_order: i64,
    pub is_active: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Optional presentation fields for a new slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotOptions {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    /// Appended after the last slot of the category when absent.
    pub display_order: Option<i64>,
    /// Defaults to active.
    pub inactive: bool,
}

/// Slot to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHomepageSlot {
    pub media_file_id: String,
    pub category: MediaCategory,
    pub options: SlotOptions,
}

impl NewHomepageSlot {
    pub fn new(media_file_id: impl Into<String>, category: MediaCategory) -> Self {
        Self {
            media_file_id: media_file_id.into(),
            category,
            options: SlotOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SlotOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct HomepageSlotRow {
    pub id: String,
    pub media_file_id: String,
    pub category: String,
    pub display_order: i64,
    pub is_active: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<HomepageSlotRow> for HomepageMediaSlot {
    type Error = MediaError;

    fn try_from(row: HomepageSlotRow) -> Result<Self, Self::Error> {
        let category = row
            .category
            .parse()
            .map_err(|e: MediaError| corrupted("homepage_media", e.to_string()))?;
        Ok(Self {
            id: row.id,
            media_file_id: row.media_file_id,
            category,
            display_order: row.display_order,
            is_active: row.is_active,
            title: row.title,
            description: row.description,
            link_url: row.link_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// An inactive slot whose media still occupies object storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupCandidate {
    pub slot_id: String,
    pub media_file_id: String,
    pub storage_path: String,
    pub drive_url: Option<String>,
    pub file_size: u64,
}

/// One transferred media file counted toward storage usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageUsageRow {
    pub media_file_id: String,
    pub category: MediaCategory,
    pub file_size: u64,
}

// =============================================================================
// Events
// =============================================================================

/// A media file shown on an event page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventMediaLink {
    pub id: String,
    pub event_id: String,
    pub media_file_id: String,
    pub display_order: i64,
    pub is_featured: bool,
    pub created_at: i64,
}

impl EventMediaLink {
    pub fn new(
        event_id: impl Into<String>,
        media_file_id: impl Into<String>,
        display_order: i64,
        is_featured: bool,
        now: i64,
    ) -> Self {
        Self {
            id: new_id(),
            event_id: event_id.into(),
            media_file_id: media_file_id.into(),
            display_order,
            is_featured,
            created_at: now,
        }
    }
}

/// Drive folders provisioned for an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventFolder {
    pub id: String,
    pub event_id: String,
    pub event_name: String,
    pub drive_folder_id: String,
    pub photos_folder_id: String,
    pub videos_folder_id: String,
    pub folder_url: String,
    pub photos_url: String,
    pub videos_url: String,
    pub created_at: i64,
}

impl EventFolder {
    pub fn from_links(
        event_id: impl Into<String>,
        event_name: impl Into<String>,
        links: bridge_traits::storage::EventFolderLinks,
        now: i64,
    ) -> Self {
        Self {
            id: new_id(),
            event_id: event_id.into(),
            event_name: event_name.into(),
            drive_folder_id: links.folder_id,
            photos_folder_id: links.photos_folder_id,
            videos_folder_id: links.videos_folder_id,
            folder_url: links.folder_url,
            photos_url: links.photos_url,
            videos_url: links.videos_url,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MediaFile {
        MediaFile::drive_only(
            "abc123",
            "hero.jpg",
            "image/jpeg",
            2 * 1024 * 1024,
            "https://drive.google.com/uc?export=view&id=abc123",
            1_700_000_000,
        )
    }

    #[test]
    fn test_category_round_trip() {
        for category in MediaCategory::ALL {
            assert_eq!(category.as_str().parse::<MediaCategory>().unwrap(), category);
        }
        assert!("wallpaper".parse::<MediaCategory>().is_err());
        assert!(MediaCategory::BackgroundVideo.is_exclusive());
        assert!(!MediaCategory::HeroImage.is_exclusive());
    }

    #[test]
    fn test_drive_only_defaults() {
        let media = sample();
        assert_eq!(media.storage_backend, StorageBackend::DriveOnly);
        assert_eq!(media.transfer_status, TransferStatus::Pending);
        assert_eq!(media.canonical_url(), media.drive_url.as_deref().unwrap());
        assert!(media.storage_path.is_none());
        assert!(media.is_public);
        assert!(media.validate().is_ok());
    }

    #[test]
    fn test_completed_requires_path() {
        let mut media = sample();
        media.transfer_status = TransferStatus::Completed;
        assert!(media.validate().is_err());

        media.storage_path = Some("gallery_image/1-hero.jpg".to_string());
        assert!(media.validate().is_ok());
    }

    #[test]
    fn test_row_with_unknown_status_is_corrupted() {
        let row = MediaFileRow {
            id: "m1".into(),
            name: "a".into(),
            mime_type: "image/png".into(),
            file_size: 1,
            drive_file_id: None,
            drive_url: None,
            download_url: "https://x".into(),
            thumbnail_url: None,
            storage_backend: "drive_only".into(),
            transfer_status: "archived".into(),
            storage_path: None,
            uploaded_by: None,
            is_public: true,
            is_archived: false,
            created_at: 0,
            updated_at: 0,
        };
        assert!(matches!(
            MediaFile::try_from(row),
            Err(MediaError::CorruptedRow { .. })
        ));
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&MediaCategory::GalleryImage).unwrap();
        assert_eq!(json, "\"gallery_image\"");
    }
}

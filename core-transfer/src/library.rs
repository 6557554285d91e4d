//! Media library service
//!
//! Catalog operations that touch the remote file provider: uploads,
//! registration of existing Drive files, slot activation, deletion and event
//! folders. Background video activation always goes through
//! [`HomepageMediaRepository::set_active_background_video`].

use bridge_traits::storage::{
    ObjectStorage, RemoteFile, RemoteFileProvider, UploadFile, UploadProgressFn,
};
use bridge_traits::time::{Clock, SystemClock};
use core_media::{
    EventFolder, EventFolderRepository, EventMediaLink, EventMediaRepository,
    HomepageMediaRepository, HomepageMediaSlot, MediaCategory, MediaFile, MediaFileRepository,
    NewHomepageSlot, SlotOptions,
};
use core_runtime::events::{CoreEvent, EventBus, MediaEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{Result, TransferError};

/// Options for a new homepage entry.
#[derive(Debug, Clone, Default)]
pub struct MediaOptions {
    pub slot: SlotOptions,
    pub uploaded_by: Option<String>,
}

/// A catalog record together with its homepage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredMedia {
    pub media: MediaFile,
    pub slot: HomepageMediaSlot,
}

/// Repositories the service writes to.
#[derive(Clone)]
pub struct CatalogRepositories {
    pub media: Arc<dyn MediaFileRepository>,
    pub slots: Arc<dyn HomepageMediaRepository>,
    pub event_media: Arc<dyn EventMediaRepository>,
    pub event_folders: Arc<dyn EventFolderRepository>,
}

pub struct MediaLibraryService {
    remote: Arc<dyn RemoteFileProvider>,
    storage: Arc<dyn ObjectStorage>,
    repos: CatalogRepositories,
    events: EventBus,
    clock: Arc<dyn Clock>,
    homepage_folder: String,
    homepage_folder_id: Mutex<Option<String>>,
}

impl MediaLibraryService {
    pub fn new(
        remote: Arc<dyn RemoteFileProvider>,
        storage: Arc<dyn ObjectStorage>,
        repos: CatalogRepositories,
        events: EventBus,
        homepage_folder: impl Into<String>,
    ) -> Self {
        Self {
            remote,
            storage,
            repos,
            events,
            clock: Arc::new(SystemClock),
            homepage_folder: homepage_folder.into(),
            homepage_folder_id: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.emit(CoreEvent::Media(event));
    }

    /// Id of the Drive folder homepage uploads go to, created on first use.
    async fn homepage_folder_id(&self) -> Result<String> {
        let mut cached = self.homepage_folder_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let existing = self
            .remote
            .find_folder_by_name(&self.homepage_folder, None)
            .await
            .map_err(TransferError::Remote)?;
        let folder = match existing {
            Some(folder) => folder,
            None => {
                info!(folder = %self.homepage_folder, "Creating homepage folder");
                self.remote
                    .create_folder(&self.homepage_folder, None)
                    .await
                    .map_err(TransferError::Remote)?
            }
        };

        *cached = Some(folder.id.clone());
        Ok(folder.id)
    }

    /// Upload a file to Drive and place it on the homepage.
    ///
    /// The Drive copy is made public before the record is written.
    #[instrument(skip(self, file, category, options, on_progress), fields(name = %file.name, category = %category))]
    pub async fn upload_homepage_media(
        &self,
        file: UploadFile,
        category: MediaCategory,
        options: MediaOptions,
        on_progress: Option<UploadProgressFn<'_>>,
    ) -> Result<RegisteredMedia> {
        if !self.remote.is_authenticated().await && !self.remote.authenticate().await {
            return Err(TransferError::NotAuthenticated);
        }

        let folder_id = self.homepage_folder_id().await?;
        let remote_file = self
            .remote
            .upload_file(file, Some(&folder_id), on_progress)
            .await
            .map_err(TransferError::Remote)?;

        self.record(remote_file, category, options).await
    }

    /// Record a file that already exists on Drive.
    #[instrument(skip(self, options))]
    pub async fn register_drive_file(
        &self,
        file_id: &str,
        category: MediaCategory,
        options: MediaOptions,
    ) -> Result<RegisteredMedia> {
        let remote_file = self
            .remote
            .get_metadata(file_id)
            .await
            .map_err(TransferError::Remote)?;
        self.record(remote_file, category, options).await
    }

    async fn record(
        &self,
        remote_file: RemoteFile,
        category: MediaCategory,
        options: MediaOptions,
    ) -> Result<RegisteredMedia> {
        // One record per Drive file; another placement only adds a slot.
        let existing = self.repos.media.find_by_drive_file_id(&remote_file.id).await?;
        let media = match existing {
            Some(media) => {
                debug!(media_id = %media.id, "Drive file already catalogued, adding slot");
                media
            }
            None => self.insert_record(&remote_file, options.uploaded_by).await?,
        };

        let wants_active = !options.slot.inactive;
        let exclusive = category.is_exclusive();
        let mut slot_options = options.slot;
        if exclusive {
            // Activation happens below through the exclusive path.
            slot_options.inactive = true;
        }
        let mut slot = self
            .repos
            .slots
            .insert(NewHomepageSlot::new(&media.id, category).with_options(slot_options))
            .await?;
        if exclusive && wants_active {
            slot = self.repos.slots.set_active_background_video(&media.id).await?;
        }

        info!(media_id = %media.id, slot_id = %slot.id, "Media registered");
        self.emit(MediaEvent::Registered {
            media_id: media.id.clone(),
            name: media.name.clone(),
            category: category.as_str().to_string(),
        });
        Ok(RegisteredMedia { media, slot })
    }

    async fn insert_record(
        &self,
        remote_file: &RemoteFile,
        uploaded_by: Option<String>,
    ) -> Result<MediaFile> {
        self.remote
            .make_file_public(&remote_file.id)
            .await
            .map_err(TransferError::Remote)?;

        let media = MediaFile::drive_only(
            &remote_file.id,
            &remote_file.name,
            remote_file
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            remote_file.size.unwrap_or_default(),
            self.remote.public_url(&remote_file.id),
            self.clock.unix_timestamp(),
        )
        .with_thumbnail(remote_file.thumbnail_link.clone())
        .with_uploaded_by(uploaded_by);
        self.repos.media.insert(&media).await?;
        Ok(media)
    }

    /// Toggle a homepage slot.
    #[instrument(skip(self))]
    pub async fn set_slot_active(&self, slot_id: &str, active: bool) -> Result<HomepageMediaSlot> {
        let slot = self
            .repos
            .slots
            .find_by_id(slot_id)
            .await?
            .ok_or_else(|| TransferError::not_found("HomepageMediaSlot", slot_id))?;

        let updated = if active && slot.category == MediaCategory::BackgroundVideo {
            self.repos
                .slots
                .set_active_background_video(&slot.media_file_id)
                .await?
        } else {
            self.repos.slots.set_active(slot_id, active).await?
        };

        let event = if updated.is_active {
            MediaEvent::SlotActivated {
                slot_id: updated.id.clone(),
                category: updated.category.as_str().to_string(),
            }
        } else {
            MediaEvent::SlotDeactivated {
                slot_id: updated.id.clone(),
                category: updated.category.as_str().to_string(),
            }
        };
        self.emit(event);
        Ok(updated)
    }

    /// Delete the object storage copy, if any, then the record.
    ///
    /// Slots and event links are removed with the record. The Drive original
    /// is kept.
    #[instrument(skip(self))]
    pub async fn delete_media(&self, media_id: &str) -> Result<()> {
        let media = self
            .repos
            .media
            .find_by_id(media_id)
            .await?
            .ok_or_else(|| TransferError::not_found("MediaFile", media_id))?;

        if let Some(path) = media.storage_path {
            self.storage
                .delete(&[path])
                .await
                .map_err(TransferError::Storage)?;
        }
        self.repos.media.delete(media_id).await?;

        self.emit(MediaEvent::Deleted {
            media_id: media_id.to_string(),
        });
        Ok(())
    }

    pub async fn attach_to_event(
        &self,
        event_id: &str,
        media_id: &str,
        featured: bool,
    ) -> Result<EventMediaLink> {
        Ok(self
            .repos
            .event_media
            .link(event_id, media_id, featured)
            .await?)
    }

    /// Media shown on an event page, in display order.
    pub async fn event_media(&self, event_id: &str) -> Result<Vec<(EventMediaLink, MediaFile)>> {
        let links = self.repos.event_media.list_for_event(event_id).await?;
        let mut items = Vec::with_capacity(links.len());
        for link in links {
            if let Some(media) = self.repos.media.find_by_id(&link.media_file_id).await? {
                items.push((link, media));
            }
        }
        Ok(items)
    }

    /// Drive folders for an event, created on first request.
    #[instrument(skip(self))]
    pub async fn provision_event_folder(
        &self,
        event_name: &str,
        event_id: &str,
    ) -> Result<EventFolder> {
        if let Some(folder) = self.repos.event_folders.find_by_event(event_id).await? {
            debug!(folder_id = %folder.drive_folder_id, "Event folder already provisioned");
            return Ok(folder);
        }

        let links = self
            .remote
            .create_event_folder(event_name, event_id)
            .await
            .map_err(TransferError::Remote)?;
        let folder = EventFolder::from_links(event_id, event_name, links, self.clock.unix_timestamp());
        self.repos.event_folders.insert(&folder).await?;

        self.emit(MediaEvent::EventFolderProvisioned {
            event_id: event_id.to_string(),
            folder_id: folder.drive_folder_id.clone(),
        });
        Ok(folder)
    }
}

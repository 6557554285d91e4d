//! # Transfer Orchestrator
//!
//! Moves files from the remote file provider into object storage and keeps
//! the catalog pointing at the right copy.
//!
//! ## Workflow
//!
//! ```text
//! Downloading (0%) → Uploading (40%) → Processing (80%) → Completed (100%)
//!        └──────────────┴─────────────────┴──────→ Failed (error returned)
//! ```
//!
//! 1. Authenticate just in time if needed, download bytes and metadata
//! 2. Check the quota (one cleanup pass allowed), upload under the category
//! 3. Repoint the catalog rows that reference the remote file id
//! 4. Report completion
//!
//! If step 3 fails or matches no row, the uploaded object is deleted before
//! the error is returned. When step 3 succeeds for a record that already had
//! an object, that older object is deleted.
//!
//! Bulk transfers run one file at a time with a configurable pause between
//! items and never fail as a whole.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let orchestrator = TransferOrchestrator::new(drive, storage, media, slots, events, settings);
//! let outcome = orchestrator
//!     .transfer_to_object_storage("abc123", MediaCategory::GalleryImage, Some(&|p| println!("{:?}", p)))
//!     .await?;
//! ```

use bridge_traits::storage::{ObjectStorage, RemoteFileProvider, StoredObject};
use bridge_traits::time::{Clock, SystemClock};
use bytes::Bytes;
use core_media::{HomepageMediaRepository, MediaCategory, MediaFileRepository};
use core_runtime::config::TransferSettings;
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use provider_supabase_storage::object_path;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, TransferError};
use crate::progress::{BulkProgress, BulkProgressFn, ProgressFn, TransferProgress, TransferStage};
use crate::quota::{CleanupFailure, CleanupReport, StorageAnalytics};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Category used by bulk transfers for files without a homepage slot.
pub const DEFAULT_BULK_CATEGORY: MediaCategory = MediaCategory::GalleryImage;

/// Result of one successful transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    /// Remote provider file id.
    pub file_id: String,
    pub storage_path: String,
    pub public_url: String,
    pub bytes: u64,
}

/// A file that failed during a bulk transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub file_id: String,
    pub error: String,
}

/// Manifest of a bulk transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkTransferReport {
    pub successful: Vec<TransferOutcome>,
    pub failed: Vec<TransferFailure>,
}

impl BulkTransferReport {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Transfer orchestrator
pub struct TransferOrchestrator {
    remote: Arc<dyn RemoteFileProvider>,
    storage: Arc<dyn ObjectStorage>,
    media: Arc<dyn MediaFileRepository>,
    slots: Arc<dyn HomepageMediaRepository>,
    events: EventBus,
    settings: TransferSettings,
    clock: Arc<dyn Clock>,
}

impl TransferOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteFileProvider>,
        storage: Arc<dyn ObjectStorage>,
        media: Arc<dyn MediaFileRepository>,
        slots: Arc<dyn HomepageMediaRepository>,
        events: EventBus,
        settings: TransferSettings,
    ) -> Self {
        Self {
            remote,
            storage,
            media,
            slots,
            events,
            settings,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for object paths.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    pub fn storage_ceiling_bytes(&self) -> u64 {
        self.settings.storage_ceiling_bytes
    }

    fn emit(&self, event: TransferEvent) {
        // No subscribers is not an error.
        let _ = self.events.emit(CoreEvent::Transfer(event));
    }

    fn report(&self, file_id: &str, stage: TransferStage, on_progress: Option<ProgressFn<'_>>) {
        let progress = TransferProgress::from(stage);
        debug!(file_id, stage = %stage, percent = progress.percent, "Transfer progress");
        if let Some(callback) = on_progress {
            callback(progress);
        }
        self.emit(TransferEvent::Progress {
            file_id: file_id.to_string(),
            stage: stage.as_str().to_string(),
            percent: progress.percent,
        });
    }

    /// Copy one remote file into object storage and repoint its records.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NotAuthenticated`] if authentication fails
    /// - [`TransferError::InsufficientSpace`] if the file does not fit even
    ///   after a cleanup pass; nothing is uploaded
    /// - [`TransferError::NoMatchingRecord`] if no record references
    ///   `file_id`; the uploaded object is deleted again
    #[instrument(skip(self, category, on_progress), fields(category = %category))]
    pub async fn transfer_to_object_storage(
        &self,
        file_id: &str,
        category: MediaCategory,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome> {
        self.emit(TransferEvent::Started {
            file_id: file_id.to_string(),
            category: category.as_str().to_string(),
        });

        match self.run_transfer(file_id, category, on_progress).await {
            Ok(outcome) => {
                info!(
                    storage_path = %outcome.storage_path,
                    bytes = outcome.bytes,
                    "Transfer completed"
                );
                self.emit(TransferEvent::Completed {
                    file_id: file_id.to_string(),
                    storage_path: outcome.storage_path.clone(),
                    bytes: outcome.bytes,
                });
                Ok(outcome)
            }
            Err(e) => {
                error!(error = %e, "Transfer failed");
                self.emit(TransferEvent::Failed {
                    file_id: file_id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_transfer(
        &self,
        file_id: &str,
        category: MediaCategory,
        on_progress: Option<ProgressFn<'_>>,
    ) -> Result<TransferOutcome> {
        self.report(file_id, TransferStage::Downloading, on_progress);
        if !self.remote.is_authenticated().await && !self.remote.authenticate().await {
            return Err(TransferError::NotAuthenticated);
        }
        let downloaded = self
            .remote
            .download_file(file_id)
            .await
            .map_err(TransferError::Remote)?;
        let bytes = downloaded.data.len() as u64;
        let mime_type = downloaded
            .metadata
            .mime_type
            .clone()
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());
        let previous_path = self
            .media
            .find_by_drive_file_id(file_id)
            .await?
            .and_then(|media| media.storage_path);

        self.report(file_id, TransferStage::Uploading, on_progress);
        let stored = self
            .upload_to_object_storage(
                downloaded.data,
                category,
                &downloaded.metadata.name,
                &mime_type,
            )
            .await?;

        self.report(file_id, TransferStage::Processing, on_progress);
        let updated = self
            .media
            .mark_transferred(file_id, &stored.path, &stored.public_url)
            .await;
        match updated {
            Ok(0) => {
                self.discard_object(&stored.path).await;
                return Err(TransferError::NoMatchingRecord {
                    file_id: file_id.to_string(),
                });
            }
            Ok(rows) => debug!(rows, "Catalog repointed to object storage"),
            Err(e) => {
                self.discard_object(&stored.path).await;
                return Err(e.into());
            }
        }
        if let Some(previous) = previous_path.filter(|path| *path != stored.path) {
            self.retire_object(&previous).await;
        }

        self.report(file_id, TransferStage::Completed, on_progress);
        Ok(TransferOutcome {
            file_id: file_id.to_string(),
            storage_path: stored.path,
            public_url: stored.public_url,
            bytes,
        })
    }

    /// Compensate for an upload whose catalog update did not happen.
    async fn discard_object(&self, path: &str) {
        match self.storage.delete(&[path.to_string()]).await {
            Ok(()) => warn!(path, "Removed object after failed catalog update"),
            Err(e) => error!(path, error = %e, "Failed to remove orphaned object"),
        }
    }

    /// Drop the object a record pointed at before it was transferred again.
    async fn retire_object(&self, path: &str) {
        match self.storage.delete(&[path.to_string()]).await {
            Ok(()) => debug!(path, "Removed superseded object"),
            Err(e) => error!(path, error = %e, "Failed to remove superseded object"),
        }
    }

    /// Transfer files one after another.
    ///
    /// Each file goes under the category of its first homepage slot, or
    /// [`DEFAULT_BULK_CATEGORY`]. The configured batch delay is awaited
    /// between items. Failures are collected; the batch never errors.
    #[instrument(skip(self, file_ids, on_progress), fields(total = file_ids.len()))]
    pub async fn bulk_transfer(
        &self,
        file_ids: &[String],
        on_progress: Option<BulkProgressFn<'_>>,
    ) -> BulkTransferReport {
        let mut report = BulkTransferReport::default();
        let total = file_ids.len();

        for (index, file_id) in file_ids.iter().enumerate() {
            let category = self.category_for(file_id).await;
            let succeeded = match self.transfer_to_object_storage(file_id, category, None).await {
                Ok(outcome) => {
                    report.successful.push(outcome);
                    true
                }
                Err(e) => {
                    report.failed.push(TransferFailure {
                        file_id: file_id.clone(),
                        error: e.to_string(),
                    });
                    false
                }
            };

            if let Some(callback) = on_progress {
                callback(BulkProgress {
                    completed: index + 1,
                    total,
                    file_id: file_id.clone(),
                    succeeded,
                });
            }

            if index + 1 < total && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
        }

        info!(
            successful = report.successful.len(),
            failed = report.failed.len(),
            "Bulk transfer finished"
        );
        self.emit(TransferEvent::BatchCompleted {
            successful: report.successful.len(),
            failed: report.failed.len(),
        });
        report
    }

    async fn category_for(&self, file_id: &str) -> MediaCategory {
        let media = match self.media.find_by_drive_file_id(file_id).await {
            Ok(Some(media)) => media,
            _ => return DEFAULT_BULK_CATEGORY,
        };
        match self.slots.list_for_media(&media.id).await {
            Ok(slots) => slots
                .first()
                .map(|slot| slot.category)
                .unwrap_or(DEFAULT_BULK_CATEGORY),
            Err(_) => DEFAULT_BULK_CATEGORY,
        }
    }

    /// Upload bytes under `{category}/{epoch_millis}-{sanitized_name}`.
    ///
    /// Checks the quota first. Backend failures are returned as-is; there is
    /// no retry.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_to_object_storage(
        &self,
        data: Bytes,
        category: MediaCategory,
        original_name: &str,
        mime_type: &str,
    ) -> Result<StoredObject> {
        self.ensure_storage_space(data.len() as u64).await?;

        let path = object_path(
            category.as_str(),
            original_name,
            self.clock.unix_timestamp_millis(),
        );
        let stored = self
            .storage
            .upload(&path, data, mime_type)
            .await
            .map_err(TransferError::Storage)?;
        debug!(path = %stored.path, "Uploaded to object storage");
        Ok(stored)
    }

    /// Usage of transferred media referenced by homepage slots.
    pub async fn storage_analytics(&self) -> Result<StorageAnalytics> {
        let rows = self.slots.storage_usage_rows().await?;
        Ok(StorageAnalytics::from_rows(
            &rows,
            self.settings.storage_ceiling_bytes,
        ))
    }

    /// Remove objects whose media is only referenced by inactive slots.
    ///
    /// The record is reset to `pending` and pointed back at the remote
    /// provider, so the file can be transferred again later. Per-item errors
    /// are collected.
    #[instrument(skip(self))]
    pub async fn cleanup_inactive_files(&self) -> Result<CleanupReport> {
        let candidates = self.slots.find_inactive_transferred().await?;
        let mut report = CleanupReport::default();

        for candidate in candidates {
            // Re-read the slots: one may have been activated since the scan.
            let slots = self.slots.list_for_media(&candidate.media_file_id).await;
            match slots {
                Ok(slots) if slots.iter().any(|slot| slot.is_active) => {
                    debug!(media_id = %candidate.media_file_id, "Media active again, skipping");
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    report.errors.push(CleanupFailure {
                        media_file_id: candidate.media_file_id,
                        storage_path: candidate.storage_path,
                        error: e.to_string(),
                    });
                    continue;
                }
            }

            let deleted = self
                .storage
                .delete(std::slice::from_ref(&candidate.storage_path))
                .await;
            if let Err(e) = deleted {
                warn!(path = %candidate.storage_path, error = %e, "Cleanup delete failed");
                report.errors.push(CleanupFailure {
                    media_file_id: candidate.media_file_id,
                    storage_path: candidate.storage_path,
                    error: e.to_string(),
                });
                continue;
            }

            let reset = self.media.reset_transfer(&candidate.media_file_id).await;
            if let Err(e) = reset {
                warn!(media_id = %candidate.media_file_id, error = %e, "Cleanup reset failed");
                report.errors.push(CleanupFailure {
                    media_file_id: candidate.media_file_id,
                    storage_path: candidate.storage_path,
                    error: e.to_string(),
                });
                continue;
            }

            report.freed_bytes = report.freed_bytes.saturating_add(candidate.file_size);
            report.cleaned.push(candidate.media_file_id);
        }

        info!(
            cleaned = report.cleaned.len(),
            errors = report.errors.len(),
            freed_bytes = report.freed_bytes,
            "Cleanup finished"
        );
        self.emit(TransferEvent::CleanupCompleted {
            cleaned: report.cleaned.len(),
            errors: report.errors.len(),
        });
        Ok(report)
    }

    /// Make sure `required_bytes` more fit under the ceiling.
    ///
    /// Runs one cleanup pass when over budget.
    ///
    /// # Errors
    /// [`TransferError::InsufficientSpace`] if still over budget afterwards.
    #[instrument(skip(self))]
    pub async fn ensure_storage_space(&self, required_bytes: u64) -> Result<()> {
        let analytics = self.storage_analytics().await?;
        if analytics.fits(required_bytes) {
            return Ok(());
        }

        info!(
            used = analytics.used_bytes,
            ceiling = analytics.ceiling_bytes,
            "Storage ceiling would be exceeded, running cleanup"
        );
        self.cleanup_inactive_files().await?;

        let analytics = self.storage_analytics().await?;
        if analytics.fits(required_bytes) {
            return Ok(());
        }

        Err(TransferError::InsufficientSpace {
            required_bytes,
            available_bytes: analytics.available_bytes(),
        })
    }
}

//! # Media Transfer
//!
//! Moves media from the remote file provider into object storage and keeps
//! the catalog consistent.
//!
//! - [`TransferOrchestrator`] - single and bulk transfers, quota checks,
//!   cleanup of inactive objects, storage analytics
//! - [`MediaLibraryService`] - uploads, registration, slot activation,
//!   deletion and event folders
//!
//! Both take their adapters and repositories as constructor arguments; the
//! composition root decides whether they are live or in-memory.

pub mod error;
pub mod library;
pub mod orchestrator;
pub mod progress;
pub mod quota;

pub use error::{Result, TransferError};
pub use library::{CatalogRepositories, MediaLibraryService, MediaOptions, RegisteredMedia};
pub use orchestrator::{
    BulkTransferReport, TransferFailure, TransferOrchestrator, TransferOutcome,
    DEFAULT_BULK_CATEGORY,
};
pub use progress::{BulkProgress, BulkProgressFn, ProgressFn, TransferProgress, TransferStage};
pub use quota::{CategoryUsage, CleanupFailure, CleanupReport, StorageAnalytics};

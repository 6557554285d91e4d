//! # Repositories
//!
//! One trait per table with a SQLite implementation built on a shared
//! `sqlx` pool. Callers hold `Arc<dyn ...Repository>` so tests and hosts
//! can substitute their own.
//!
//! - `MediaFileRepository` - canonical media records
//! - `HomepageMediaRepository` - homepage slots, exclusivity, cleanup and usage scans
//! - `EventMediaRepository` - media shown on event pages
//! - `EventFolderRepository` - Drive folders provisioned per event

pub mod event;
pub mod homepage;
pub mod media_file;
pub mod pagination;

pub use event::{
    EventFolderRepository, EventMediaRepository, SqliteEventFolderRepository,
    SqliteEventMediaRepository,
};
pub use homepage::{HomepageMediaRepository, SqliteHomepageMediaRepository};
pub use media_file::{MediaFileRepository, SqliteMediaFileRepository};
pub use pagination::{Page, PageRequest};

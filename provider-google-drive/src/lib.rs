//! # Google Drive Provider
//!
//! Implements [`RemoteFileProvider`](bridge_traits::storage::RemoteFileProvider)
//! for Google Drive API v3.
//!
//! ## Overview
//!
//! - Folder lookup and creation, including per-event folder trees
//! - Resumable uploads in 256 KiB-aligned chunks with progress reporting
//! - Downloads, public sharing and deletion
//! - Exponential backoff for rate limiting and server errors
//!
//! Access tokens come from an injected
//! [`AccessTokenProvider`](core_auth::AccessTokenProvider). The
//! [`InMemoryDriveProvider`] stands in for Drive in the stub profile.

pub mod connector;
pub mod error;
pub mod stub;
pub mod types;

pub use connector::{folder_url, view_url, GoogleDriveConnector, UPLOAD_CHUNK_ALIGNMENT};
pub use error::{GoogleDriveError, Result};
pub use stub::InMemoryDriveProvider;

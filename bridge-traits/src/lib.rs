//! # Host Bridge Traits
//!
//! Capability traits the media core depends on but never implements itself.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP with retry policy and timeouts
//!
//! ### Storage
//! - [`SecureStore`](storage::SecureStore) - Credential persistence
//! - [`RemoteFileProvider`](storage::RemoteFileProvider) - Folder-based file host (Google Drive)
//! - [`ObjectStorage`](storage::ObjectStorage) - Bucket-based object store (Supabase Storage)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Implementations
//!
//! | Capability | Live | Stub |
//! |------------|------|------|
//! | `HttpClient`, `SecureStore` | `bridge-desktop` | test mocks |
//! | `RemoteFileProvider` | `provider-google-drive::GoogleDriveConnector` | `InMemoryDriveProvider` |
//! | `ObjectStorage` | `provider-supabase-storage::SupabaseStorageConnector` | `InMemoryObjectStorage` |
//!
//! The composition root in `core-service` picks one column per capability.
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert their own error types into it and keep messages actionable
//! (status codes, paths, ids).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared behind
//! `Arc` across async tasks.

pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use storage::{
    DownloadedFile, EventFolderLinks, ObjectInfo, ObjectStorage, RemoteFile, RemoteFileProvider,
    SecureStore, StoredObject, UploadFile, UploadProgressFn,
};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};

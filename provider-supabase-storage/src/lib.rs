//! # Supabase Storage Provider
//!
//! Implements [`ObjectStorage`](bridge_traits::storage::ObjectStorage) over
//! the Supabase Storage REST API.
//!
//! Objects are written once (no upsert) with a fixed cache policy and served
//! from the bucket's public URL. Paths follow the
//! `{category}/{epoch_millis}-{sanitized_name}` convention built by
//! [`object_path`].

pub mod connector;
pub mod error;
pub mod path;
pub mod stub;
pub mod types;

pub use connector::SupabaseStorageConnector;
pub use error::{Result, StorageError};
pub use path::{object_path, sanitize_file_name};
pub use stub::InMemoryObjectStorage;

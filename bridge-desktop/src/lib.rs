//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts.
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the OS keychain (`keyring`)
//! - `SecureStore` using a SQLite table shared with the media catalog
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, SqliteSecretStore};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new());
//! let secrets = Arc::new(SqliteSecretStore::new(pool.clone()).await?);
//! ```

mod http;
mod sqlite_secrets;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use sqlite_secrets::SqliteSecretStore;

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;

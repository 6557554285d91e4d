//! # Media Core Configuration
//!
//! Builder-based configuration for the media transfer core with fail-fast
//! validation.
//!
//! ## Backend profile
//!
//! The presence of credentials decides whether live adapters are wired:
//! both the Google Drive OAuth client and the object storage service key must
//! be configured for [`BackendProfile::Live`]. Anything less yields
//! [`BackendProfile::Stub`], where the composition root injects in-memory
//! fakes so downstream logic still runs.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{DriveConfig, MediaConfig, ObjectStorageConfig};
//!
//! let config = MediaConfig::builder()
//!     .database_path("/var/lib/boujee/media.db")
//!     .drive(DriveConfig::new("client-id", "http://localhost:8080/oauth/callback"))
//!     .object_storage(ObjectStorageConfig::new(
//!         "https://project.supabase.co",
//!         "service-key",
//!         "media",
//!     ))
//!     .build()?;
//! ```
//!
//! Or from the process environment:
//!
//! ```ignore
//! let config = MediaConfig::from_env()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HttpClient, SecureStore};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Storage ceiling of the object storage plan (8 GiB).
pub const DEFAULT_STORAGE_CEILING_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Pause between items of a bulk transfer.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(1);

/// `cache-control` max-age applied to every uploaded object.
pub const DEFAULT_CACHE_CONTROL_SECS: u32 = 3600;

pub const DEFAULT_HOMEPAGE_FOLDER: &str = "Boujee Homepage Media";
pub const DEFAULT_BUCKET: &str = "media";

/// Environment variable names read by [`MediaConfig::from_env`].
pub mod env {
    pub const DATABASE_PATH: &str = "MEDIA_DATABASE_PATH";
    pub const DRIVE_CLIENT_ID: &str = "GOOGLE_DRIVE_CLIENT_ID";
    pub const DRIVE_CLIENT_SECRET: &str = "GOOGLE_DRIVE_CLIENT_SECRET";
    pub const DRIVE_REDIRECT_URI: &str = "GOOGLE_DRIVE_REDIRECT_URI";
    pub const DRIVE_HOMEPAGE_FOLDER: &str = "GOOGLE_DRIVE_HOMEPAGE_FOLDER";
    pub const STORAGE_URL: &str = "SUPABASE_URL";
    pub const STORAGE_SERVICE_KEY: &str = "SUPABASE_SERVICE_KEY";
    pub const STORAGE_BUCKET: &str = "SUPABASE_STORAGE_BUCKET";
    pub const BATCH_DELAY_MS: &str = "MEDIA_BATCH_DELAY_MS";
}

/// Which family of adapters the composition root wires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProfile {
    /// Google Drive + Supabase Storage over HTTP.
    Live,
    /// In-memory fakes with a deterministic access token.
    Stub,
}

/// OAuth client registration for Google Drive.
#[derive(Clone, PartialEq, Eq)]
pub struct DriveConfig {
    pub client_id: String,
    /// Absent for public (PKCE-only) clients.
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Folder that receives homepage uploads. Found or created on first use.
    pub homepage_folder: String,
}

impl DriveConfig {
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            homepage_folder: DEFAULT_HOMEPAGE_FOLDER.to_string(),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_homepage_folder(mut self, folder: impl Into<String>) -> Self {
        self.homepage_folder = folder.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config("Drive client id cannot be empty".to_string()));
        }
        if !self.redirect_uri.starts_with("http://") && !self.redirect_uri.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "Drive redirect URI must be an http(s) URL, got '{}'",
                self.redirect_uri
            )));
        }
        if self.homepage_folder.trim().is_empty() {
            return Err(Error::Config(
                "Drive homepage folder name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("homepage_folder", &self.homepage_folder)
            .finish()
    }
}

/// Supabase Storage project and bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub project_url: String,
    pub service_key: String,
    pub bucket: String,
}

impl ObjectStorageConfig {
    pub fn new(
        project_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            project_url: project_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.project_url.starts_with("http://") && !self.project_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Object storage URL must be an http(s) URL, got '{}'",
                self.project_url
            )));
        }
        if self.service_key.trim().is_empty() {
            return Err(Error::Config(
                "Object storage service key cannot be empty".to_string(),
            ));
        }
        if self.bucket.trim().is_empty() || self.bucket.contains('/') {
            return Err(Error::Config(format!(
                "Invalid object storage bucket name '{}'",
                self.bucket
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorageConfig")
            .field("project_url", &self.project_url)
            .field("service_key", &"[REDACTED]")
            .field("bucket", &self.bucket)
            .finish()
    }
}

/// Quota and pacing of the transfer orchestrator.
///
/// Fixed for the lifetime of the orchestrator built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    pub storage_ceiling_bytes: u64,
    pub batch_delay: Duration,
    pub cache_control_secs: u32,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            storage_ceiling_bytes: DEFAULT_STORAGE_CEILING_BYTES,
            batch_delay: DEFAULT_BATCH_DELAY,
            cache_control_secs: DEFAULT_CACHE_CONTROL_SECS,
        }
    }
}

impl TransferSettings {
    fn validate(&self) -> Result<()> {
        if self.storage_ceiling_bytes == 0 {
            return Err(Error::Config(
                "Storage ceiling must be greater than 0".to_string(),
            ));
        }
        if self.cache_control_secs == 0 {
            return Err(Error::Config(
                "cache-control max-age must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Media core configuration.
///
/// Use [`MediaConfigBuilder`] or [`MediaConfig::from_env`] to construct.
#[derive(Clone)]
pub struct MediaConfig {
    /// SQLite database file. `None` keeps the catalog in memory.
    pub database_path: Option<PathBuf>,

    pub profile: BackendProfile,

    pub drive: Option<DriveConfig>,

    pub object_storage: Option<ObjectStorageConfig>,

    pub transfer: TransferSettings,

    /// HTTP client for live adapters (desktop default: reqwest)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Device-local credential store, tried after the relational store
    pub secure_store: Option<Arc<dyn SecureStore>>,
}

impl fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaConfig")
            .field("database_path", &self.database_path)
            .field("profile", &self.profile)
            .field("drive", &self.drive)
            .field("object_storage", &self.object_storage)
            .field("transfer", &self.transfer)
            .field("http_client", &self.http_client.is_some())
            .field("secure_store", &self.secure_store.is_some())
            .finish()
    }
}

impl MediaConfig {
    pub fn builder() -> MediaConfigBuilder {
        MediaConfigBuilder::default()
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut builder = MediaConfig::builder();

        if let Some(path) = get(env::DATABASE_PATH) {
            builder = builder.database_path(path);
        }

        if let Some(client_id) = get(env::DRIVE_CLIENT_ID) {
            let redirect_uri = get(env::DRIVE_REDIRECT_URI).ok_or_else(|| {
                Error::Config(format!(
                    "{} is set but {} is missing",
                    env::DRIVE_CLIENT_ID,
                    env::DRIVE_REDIRECT_URI
                ))
            })?;
            let mut drive = DriveConfig::new(client_id, redirect_uri);
            if let Some(secret) = get(env::DRIVE_CLIENT_SECRET) {
                drive = drive.with_client_secret(secret);
            }
            if let Some(folder) = get(env::DRIVE_HOMEPAGE_FOLDER) {
                drive = drive.with_homepage_folder(folder);
            }
            builder = builder.drive(drive);
        }

        if let (Some(url), Some(key)) = (get(env::STORAGE_URL), get(env::STORAGE_SERVICE_KEY)) {
            let bucket = get(env::STORAGE_BUCKET).unwrap_or_else(|| DEFAULT_BUCKET.to_string());
            builder = builder.object_storage(ObjectStorageConfig::new(url, key, bucket));
        }

        if let Some(raw) = get(env::BATCH_DELAY_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of milliseconds, got '{}'",
                    env::BATCH_DELAY_MS,
                    raw
                ))
            })?;
            builder = builder.batch_delay(Duration::from_millis(millis));
        }

        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.database_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Database path cannot be empty".to_string()));
            }
        }

        if let Some(drive) = &self.drive {
            drive.validate()?;
        }
        if let Some(storage) = &self.object_storage {
            storage.validate()?;
        }
        self.transfer.validate()?;

        if self.profile == BackendProfile::Live {
            if self.drive.is_none() {
                return Err(Error::Config(
                    "Live profile requires Google Drive OAuth credentials".to_string(),
                ));
            }
            if self.object_storage.is_none() {
                return Err(Error::Config(
                    "Live profile requires object storage credentials".to_string(),
                ));
            }
            if self.http_client.is_none() {
                return Err(Error::CapabilityMissing {
                    capability: "HttpClient".to_string(),
                    message: "Live adapters talk HTTP. Enable the 'desktop-shims' feature \
                              for the reqwest default or inject a client."
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn is_live(&self) -> bool {
        self.profile == BackendProfile::Live
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    let client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new());
    Some(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Option<Arc<dyn HttpClient>> {
    None
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Option<Arc<dyn SecureStore>> {
    let store: Arc<dyn SecureStore> = Arc::new(bridge_desktop::KeyringSecureStore::new());
    Some(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Option<Arc<dyn SecureStore>> {
    None
}

/// Builder for [`MediaConfig`].
#[derive(Default)]
pub struct MediaConfigBuilder {
    database_path: Option<PathBuf>,
    profile: Option<BackendProfile>,
    drive: Option<DriveConfig>,
    object_storage: Option<ObjectStorageConfig>,
    transfer: TransferSettings,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
}

impl MediaConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Force a profile instead of deriving it from the credentials present.
    pub fn profile(mut self, profile: BackendProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn drive(mut self, drive: DriveConfig) -> Self {
        self.drive = Some(drive);
        self
    }

    pub fn object_storage(mut self, storage: ObjectStorageConfig) -> Self {
        self.object_storage = Some(storage);
        self
    }

    pub fn storage_ceiling_bytes(mut self, bytes: u64) -> Self {
        self.transfer.storage_ceiling_bytes = bytes;
        self
    }

    pub fn batch_delay(mut self, delay: Duration) -> Self {
        self.transfer.batch_delay = delay;
        self
    }

    pub fn cache_control_secs(mut self, secs: u32) -> Self {
        self.transfer.cache_control_secs = secs;
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for malformed credentials or settings, or a forced
    ///   live profile without credentials
    /// - [`Error::CapabilityMissing`] when the live profile has no HTTP client
    pub fn build(self) -> Result<MediaConfig> {
        let has_credentials = self.drive.is_some() && self.object_storage.is_some();
        let profile = self.profile.unwrap_or(if has_credentials {
            BackendProfile::Live
        } else {
            BackendProfile::Stub
        });

        let (http_client, secure_store) = if profile == BackendProfile::Live {
            (
                self.http_client.or_else(provide_default_http_client),
                self.secure_store.or_else(provide_default_secure_store),
            )
        } else {
            (self.http_client, self.secure_store)
        };

        let config = MediaConfig {
            database_path: self.database_path,
            profile,
            drive: self.drive,
            object_storage: self.object_storage,
            transfer: self.transfer,
            http_client,
            secure_store,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{BridgeError, HttpRequest, HttpResponse};
    use std::collections::HashMap;

    struct MockHttpClient;

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> std::result::Result<HttpResponse, BridgeError> {
            Err(BridgeError::NotAvailable("offline".to_string()))
        }
    }

    fn drive() -> DriveConfig {
        DriveConfig::new("client-123", "http://localhost:8080/callback")
    }

    fn storage() -> ObjectStorageConfig {
        ObjectStorageConfig::new("https://project.supabase.co/", "service-key", "media")
    }

    #[test]
    fn test_defaults_to_stub_without_credentials() {
        let config = MediaConfig::builder().build().unwrap();

        assert_eq!(config.profile, BackendProfile::Stub);
        assert_eq!(
            config.transfer.storage_ceiling_bytes,
            DEFAULT_STORAGE_CEILING_BYTES
        );
        assert_eq!(config.transfer.batch_delay, Duration::from_secs(1));
        assert_eq!(config.transfer.cache_control_secs, 3600);
    }

    #[test]
    fn test_partial_credentials_stay_stub() {
        let config = MediaConfig::builder().drive(drive()).build().unwrap();
        assert_eq!(config.profile, BackendProfile::Stub);
    }

    #[test]
    fn test_full_credentials_select_live() {
        let config = MediaConfig::builder()
            .drive(drive())
            .object_storage(storage())
            .http_client(Arc::new(MockHttpClient))
            .build()
            .unwrap();

        assert!(config.is_live());
        assert_eq!(
            config.object_storage.unwrap().project_url,
            "https://project.supabase.co"
        );
    }

    #[test]
    fn test_forced_live_without_credentials_fails() {
        let result = MediaConfig::builder()
            .profile(BackendProfile::Live)
            .http_client(Arc::new(MockHttpClient))
            .build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_forced_stub_ignores_credentials() {
        let config = MediaConfig::builder()
            .profile(BackendProfile::Stub)
            .drive(drive())
            .object_storage(storage())
            .build()
            .unwrap();

        assert_eq!(config.profile, BackendProfile::Stub);
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_live_without_http_client_is_capability_missing() {
        let result = MediaConfig::builder()
            .drive(drive())
            .object_storage(storage())
            .build();

        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_ceiling = MediaConfig::builder().storage_ceiling_bytes(0).build();
        assert!(matches!(zero_ceiling, Err(Error::Config(_))));

        let bad_redirect = MediaConfig::builder()
            .drive(DriveConfig::new("client", "localhost/callback"))
            .build();
        assert!(matches!(bad_redirect, Err(Error::Config(_))));

        let bad_bucket = MediaConfig::builder()
            .object_storage(ObjectStorageConfig::new("https://x.supabase.co", "k", "a/b"))
            .build();
        assert!(matches!(bad_bucket, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_reads_variables() {
        let vars: HashMap<&str, &str> = [
            (env::DATABASE_PATH, "/tmp/media.db"),
            (env::DRIVE_CLIENT_ID, "client-abc"),
            (env::DRIVE_CLIENT_SECRET, "shh"),
            (env::DRIVE_REDIRECT_URI, "https://boujee.events/oauth"),
            (env::STORAGE_URL, "https://p.supabase.co"),
            (env::STORAGE_SERVICE_KEY, "service"),
            (env::BATCH_DELAY_MS, "250"),
        ]
        .into_iter()
        .collect();

        let config = MediaConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));

        // The live profile only validates when the desktop shims supply an
        // HTTP client.
        match config {
            Ok(config) => {
                assert!(config.is_live());
                assert_eq!(config.database_path, Some(PathBuf::from("/tmp/media.db")));
                let drive = config.drive.unwrap();
                assert_eq!(drive.client_secret.as_deref(), Some("shh"));
                assert_eq!(drive.homepage_folder, DEFAULT_HOMEPAGE_FOLDER);
                assert_eq!(config.object_storage.unwrap().bucket, DEFAULT_BUCKET);
                assert_eq!(config.transfer.batch_delay, Duration::from_millis(250));
            }
            Err(err) => assert!(matches!(err, Error::CapabilityMissing { .. })),
        }
    }

    #[test]
    fn test_from_lookup_without_credentials_is_stub() {
        let config = MediaConfig::from_lookup(|key| match key {
            env::STORAGE_URL => Some("https://p.supabase.co".to_string()),
            env::DRIVE_CLIENT_ID => Some("   ".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.profile, BackendProfile::Stub);
        assert!(config.drive.is_none());
        assert!(config.object_storage.is_none());
    }

    #[test]
    fn test_from_lookup_rejects_bad_delay() {
        let result = MediaConfig::from_lookup(|key| match key {
            env::BATCH_DELAY_MS => Some("soon".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_lookup_requires_redirect_with_client_id() {
        let result = MediaConfig::from_lookup(|key| match key {
            env::DRIVE_CLIENT_ID => Some("client".to_string()),
            _ => None,
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = MediaConfig::builder()
            .drive(drive().with_client_secret("top-secret"))
            .object_storage(storage())
            .http_client(Arc::new(MockHttpClient))
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("top-secret"));
        assert!(!debug.contains("service-key"));
        assert!(debug.contains("[REDACTED]"));
    }
}

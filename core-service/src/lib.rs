//! Media core façade and composition root.
//!
//! [`MediaCore::bootstrap`] opens the catalog, picks live or in-memory
//! adapters from the configured [`BackendProfile`] and hands them to the
//! transfer orchestrator and the library service. Nothing below this crate
//! knows which family it runs against.

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::config::{BackendProfile, MediaConfig};

use std::sync::Arc;

use bridge_desktop::SqliteSecretStore;
use bridge_traits::storage::{ObjectStorage, RemoteFileProvider};
use core_auth::{AuthManager, OAuthConfig, TokenStore};
use core_media::db::{create_pool, DatabaseConfig};
use core_media::{
    SqliteEventFolderRepository, SqliteEventMediaRepository, SqliteHomepageMediaRepository,
    SqliteMediaFileRepository,
};
use core_runtime::config::DEFAULT_HOMEPAGE_FOLDER;
use core_runtime::events::EventBus;
use core_transfer::{CatalogRepositories, MediaLibraryService, TransferOrchestrator};
use provider_google_drive::{GoogleDriveConnector, InMemoryDriveProvider};
use provider_supabase_storage::{InMemoryObjectStorage, SupabaseStorageConnector};
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};

/// Account key under which Drive tokens are persisted.
pub const DRIVE_ACCOUNT: &str = "google_drive";

const EVENT_BUS_CAPACITY: usize = 256;

/// Remote and storage adapters chosen for one profile.
struct Adapters {
    remote: Arc<dyn RemoteFileProvider>,
    storage: Arc<dyn ObjectStorage>,
    auth: Option<Arc<AuthManager>>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct MediaCore {
    profile: BackendProfile,
    pool: SqlitePool,
    events: EventBus,
    auth: Option<Arc<AuthManager>>,
    repositories: CatalogRepositories,
    orchestrator: Arc<TransferOrchestrator>,
    library: Arc<MediaLibraryService>,
}

impl MediaCore {
    /// Load `.env` if present, then bootstrap from the environment.
    pub async fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!(error = %e, "Ignoring unreadable .env file");
            }
        }
        let config = MediaConfig::from_env()?;
        Self::bootstrap(config).await
    }

    /// Open the catalog and wire every component for `config.profile`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Media`] if the database cannot be opened or migrated
    /// - [`CoreError::InitializationFailed`] if the live profile lacks a
    ///   credential or capability that validation would normally catch
    /// - [`CoreError::Auth`] if persisted Drive tokens cannot be read
    #[instrument(skip(config), fields(profile = ?config.profile))]
    pub async fn bootstrap(config: MediaConfig) -> Result<Self> {
        let db_config = match &config.database_path {
            Some(path) => DatabaseConfig::new(path),
            None => DatabaseConfig::in_memory(),
        };
        let pool = create_pool(db_config).await?;
        let events = EventBus::new(EVENT_BUS_CAPACITY);

        let adapters = match config.profile {
            BackendProfile::Live => Self::live_adapters(&config, &pool, &events).await?,
            BackendProfile::Stub => Self::stub_adapters(&config),
        };

        let repositories = CatalogRepositories {
            media: Arc::new(SqliteMediaFileRepository::new(pool.clone())),
            slots: Arc::new(SqliteHomepageMediaRepository::new(pool.clone())),
            event_media: Arc::new(SqliteEventMediaRepository::new(pool.clone())),
            event_folders: Arc::new(SqliteEventFolderRepository::new(pool.clone())),
        };

        let orchestrator = TransferOrchestrator::new(
            adapters.remote.clone(),
            adapters.storage.clone(),
            repositories.media.clone(),
            repositories.slots.clone(),
            events.clone(),
            config.transfer.clone(),
        );

        let homepage_folder = config
            .drive
            .as_ref()
            .map(|drive| drive.homepage_folder.clone())
            .unwrap_or_else(|| DEFAULT_HOMEPAGE_FOLDER.to_string());
        let library = MediaLibraryService::new(
            adapters.remote,
            adapters.storage,
            repositories.clone(),
            events.clone(),
            homepage_folder,
        );

        info!(
            profile = ?config.profile,
            in_memory = config.database_path.is_none(),
            "Media core ready"
        );

        Ok(Self {
            profile: config.profile,
            pool,
            events,
            auth: adapters.auth,
            repositories,
            orchestrator: Arc::new(orchestrator),
            library: Arc::new(library),
        })
    }

    async fn live_adapters(
        config: &MediaConfig,
        pool: &SqlitePool,
        events: &EventBus,
    ) -> Result<Adapters> {
        let drive = config.drive.as_ref().ok_or_else(|| {
            CoreError::InitializationFailed("Drive credentials missing".to_string())
        })?;
        let storage = config.object_storage.as_ref().ok_or_else(|| {
            CoreError::InitializationFailed("Object storage credentials missing".to_string())
        })?;
        let http_client = config.http_client.clone().ok_or_else(|| {
            CoreError::InitializationFailed("No HTTP client available".to_string())
        })?;

        // Relational store first, device keychain as fallback.
        let relational = Arc::new(SqliteSecretStore::new(pool.clone()).await?);
        let mut token_store = TokenStore::builder().backend("relational", relational);
        if let Some(device) = &config.secure_store {
            token_store = token_store.backend("device", device.clone());
        }

        let auth = Arc::new(AuthManager::new(
            DRIVE_ACCOUNT,
            OAuthConfig::google_drive(
                drive.client_id.clone(),
                drive.client_secret.clone(),
                drive.redirect_uri.clone(),
            ),
            token_store.build(),
            http_client.clone(),
            events.clone(),
        ));
        let usable = auth.initialize().await?;
        if !usable {
            info!("No usable Drive session; sign-in required before transfers");
        }

        let remote: Arc<dyn RemoteFileProvider> =
            Arc::new(GoogleDriveConnector::new(http_client.clone(), auth.clone()));
        let object_storage: Arc<dyn ObjectStorage> = Arc::new(
            SupabaseStorageConnector::new(
                http_client,
                storage.project_url.clone(),
                storage.service_key.clone(),
                storage.bucket.clone(),
            )
            .with_cache_control(u64::from(config.transfer.cache_control_secs)),
        );

        Ok(Adapters {
            remote,
            storage: object_storage,
            auth: Some(auth),
        })
    }

    fn stub_adapters(config: &MediaConfig) -> Adapters {
        let bucket = config
            .object_storage
            .as_ref()
            .map(|storage| storage.bucket.clone())
            .unwrap_or_else(|| core_runtime::config::DEFAULT_BUCKET.to_string());
        Adapters {
            remote: Arc::new(InMemoryDriveProvider::new()),
            storage: Arc::new(InMemoryObjectStorage::new(bucket)),
            auth: None,
        }
    }

    pub fn profile(&self) -> BackendProfile {
        self.profile
    }

    pub fn transfers(&self) -> Arc<TransferOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub fn library(&self) -> Arc<MediaLibraryService> {
        Arc::clone(&self.library)
    }

    pub fn repositories(&self) -> &CatalogRepositories {
        &self.repositories
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Drive session, present only for the live profile.
    pub fn auth(&self) -> Option<Arc<AuthManager>> {
        self.auth.clone()
    }

    /// Close the database pool. Clones of this core become unusable.
    pub async fn shutdown(&self) {
        self.pool.close().await;
        info!("Media core shut down");
    }
}

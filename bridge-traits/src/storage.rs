//! Storage Abstractions
//!
//! Secure credential persistence plus the two storage seams the media core
//! talks to: a remote file provider (folder hierarchy, sharing links) and a
//! flat object store (bucket paths, public URLs).

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts the places credentials can live:
/// - Desktop: OS keychain / Secret Service
/// - Server: a table in the relational store
///
/// # Security Requirements
///
/// Implementations MUST never log or expose stored values.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("oauth_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }

    /// List all secret keys (without values)
    async fn list_keys(&self) -> Result<Vec<String>>;

    /// Clear all secrets
    async fn clear_all(&self) -> Result<()>;
}

/// Descriptor of a file or folder held by the remote file provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_folder: bool,
    pub parent_ids: Vec<String>,
    /// Browser link to the file or folder.
    pub web_view_link: Option<String>,
    /// Direct download link, when the provider exposes one.
    pub web_content_link: Option<String>,
    pub thumbnail_link: Option<String>,
}

/// A local file handed to [`RemoteFileProvider::upload_file`].
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Bytes and metadata fetched from the remote file provider.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub metadata: RemoteFile,
    pub data: Bytes,
}

/// Folder ids and browser links produced by
/// [`RemoteFileProvider::create_event_folder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFolderLinks {
    pub folder_id: String,
    pub photos_folder_id: String,
    pub videos_folder_id: String,
    pub folder_url: String,
    pub photos_url: String,
    pub videos_url: String,
}

/// Upload progress callback, invoked with `(bytes_sent, total_bytes)`.
pub type UploadProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

pub const PHOTOS_SUBFOLDER: &str = "Photos";
pub const VIDEOS_SUBFOLDER: &str = "Videos";

/// Name of the top-level folder provisioned for an event.
pub fn event_folder_name(event_name: &str, event_id: &str) -> String {
    format!("{} - {}", event_name, event_id)
}

/// Remote file provider trait
///
/// Hierarchical file storage with folders, sharing permissions and browser
/// links. Folder creation is not unique on the provider side: callers that
/// want idempotency call [`find_folder_by_name`](Self::find_folder_by_name)
/// first.
#[async_trait]
pub trait RemoteFileProvider: Send + Sync {
    /// Obtain or refresh an access token. Returns `false` when the user has to
    /// go through the consent flow again.
    async fn authenticate(&self) -> bool;

    /// A token is present and has not expired.
    async fn is_authenticated(&self) -> bool;

    /// List non-trashed children of `folder_id` (or of the root).
    ///
    /// Returns one page of files and the cursor for the next page.
    async fn list_files(
        &self,
        folder_id: Option<&str>,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)>;

    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile>;

    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<RemoteFile>>;

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFile>;

    /// Upload a file, reporting monotonically increasing byte counts.
    async fn upload_file(
        &self,
        file: UploadFile,
        parent_folder_id: Option<&str>,
        on_progress: Option<UploadProgressFn<'_>>,
    ) -> Result<RemoteFile>;

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile>;

    /// Grant anyone-with-the-link read access.
    async fn make_file_public(&self, file_id: &str) -> Result<()>;

    /// Direct link that serves the file's bytes once it is public.
    fn public_url(&self, file_id: &str) -> String;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    /// Create `"{event_name} - {event_id}"` with `Photos` and `Videos`
    /// subfolders.
    ///
    /// Fails if any of the three creations fails. Folders created before the
    /// failure are left in place.
    async fn create_event_folder(
        &self,
        event_name: &str,
        event_id: &str,
    ) -> Result<EventFolderLinks> {
        let root = self
            .create_folder(&event_folder_name(event_name, event_id), None)
            .await?;
        let photos = self.create_folder(PHOTOS_SUBFOLDER, Some(&root.id)).await?;
        let videos = self.create_folder(VIDEOS_SUBFOLDER, Some(&root.id)).await?;

        Ok(EventFolderLinks {
            folder_url: root.web_view_link.clone().unwrap_or_default(),
            photos_url: photos.web_view_link.clone().unwrap_or_default(),
            videos_url: videos.web_view_link.clone().unwrap_or_default(),
            folder_id: root.id,
            photos_folder_id: photos.id,
            videos_folder_id: videos.id,
        })
    }
}

/// An object written to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

/// Listing entry returned by [`ObjectStorage::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub path: String,
    pub size: u64,
    pub mime_type: Option<String>,
}

/// Object storage trait
///
/// A single bucket of objects addressed by path. Objects are served through a
/// public URL derived from the path.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write `data` at `path`. Existing objects are not overwritten.
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<StoredObject>;

    /// Public URL for `path`. Does not check that the object exists.
    fn public_url(&self, path: &str) -> String;

    async fn delete(&self, paths: &[String]) -> Result<()>;

    /// List objects whose path starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;

    /// Read an object back.
    async fn download(&self, path: &str) -> Result<Bytes>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingProvider {
        created: Mutex<Vec<(String, Option<String>)>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl RemoteFileProvider for RecordingProvider {
        async fn authenticate(&self) -> bool {
            true
        }

        async fn is_authenticated(&self) -> bool {
            true
        }

        async fn list_files(
            &self,
            _folder_id: Option<&str>,
            _page_token: Option<String>,
        ) -> Result<(Vec<RemoteFile>, Option<String>)> {
            Ok((Vec::new(), None))
        }

        async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
            Err(BridgeError::NotFound(file_id.to_string()))
        }

        fn public_url(&self, file_id: &str) -> String {
            format!("https://drive.test/uc/{file_id}")
        }

        async fn find_folder_by_name(
            &self,
            _name: &str,
            _parent_id: Option<&str>,
        ) -> Result<Option<RemoteFile>> {
            Ok(None)
        }

        async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFile> {
            if self.fail_on == Some(name) {
                return Err(BridgeError::OperationFailed(format!("cannot create {name}")));
            }
            let mut created = self.created.lock().unwrap();
            let id = format!("folder-{}", created.len());
            created.push((name.to_string(), parent_id.map(str::to_string)));
            Ok(RemoteFile {
                id: id.clone(),
                name: name.to_string(),
                mime_type: None,
                size: None,
                created_at: None,
                modified_at: None,
                is_folder: true,
                parent_ids: parent_id.map(|p| vec![p.to_string()]).unwrap_or_default(),
                web_view_link: Some(format!("https://drive.test/{id}")),
                web_content_link: None,
                thumbnail_link: None,
            })
        }

        async fn upload_file(
            &self,
            _file: UploadFile,
            _parent_folder_id: Option<&str>,
            _on_progress: Option<UploadProgressFn<'_>>,
        ) -> Result<RemoteFile> {
            Err(BridgeError::NotAvailable("upload".into()))
        }

        async fn download_file(&self, file_id: &str) -> Result<DownloadedFile> {
            Err(BridgeError::NotFound(file_id.to_string()))
        }

        async fn make_file_public(&self, _file_id: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_file(&self, _file_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_event_folder_has_photos_and_videos_under_root() {
        let provider = RecordingProvider::default();
        let links = provider
            .create_event_folder("Summer Gala", "evt-42")
            .await
            .unwrap();

        let created = provider.created.lock().unwrap().clone();
        assert_eq!(created[0], ("Summer Gala - evt-42".to_string(), None));
        assert_eq!(created[1], ("Photos".to_string(), Some(links.folder_id.clone())));
        assert_eq!(created[2], ("Videos".to_string(), Some(links.folder_id.clone())));
        assert_eq!(links.photos_url, "https://drive.test/folder-1");
        assert_eq!(links.videos_folder_id, "folder-2");
    }

    #[tokio::test]
    async fn test_event_folder_fails_without_rollback() {
        let provider = RecordingProvider {
            fail_on: Some("Videos"),
            ..Default::default()
        };

        let result = provider.create_event_folder("Launch", "evt-1").await;

        assert!(result.is_err());
        // Root and Photos stay behind.
        assert_eq!(provider.created.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_upload_file_size() {
        let file = UploadFile::new("a.jpg", "image/jpeg", Bytes::from_static(b"12345"));
        assert_eq!(file.size(), 5);
    }
}

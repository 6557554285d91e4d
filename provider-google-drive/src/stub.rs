//! In-memory Drive used by the stub profile and by tests

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{
    DownloadedFile, RemoteFile, RemoteFileProvider, UploadFile, UploadProgressFn,
};
use bytes::Bytes;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use crate::connector::{folder_url, view_url, UPLOAD_CHUNK_ALIGNMENT};
use crate::types::FOLDER_MIME_TYPE;

#[derive(Default)]
struct DriveState {
    files: HashMap<String, (RemoteFile, Bytes)>,
    public: HashSet<String>,
    failing_downloads: HashSet<String>,
}

/// Drive stand-in that keeps files and folders in memory.
///
/// Behaves like the live connector for the operations the transfer flow
/// relies on: ids are opaque, folder names are not unique and uploads report
/// progress in aligned chunks.
#[derive(Default)]
pub struct InMemoryDriveProvider {
    state: Mutex<DriveState>,
    next_id: AtomicU64,
}

impl InMemoryDriveProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file under a caller-chosen id.
    pub async fn insert_file(
        &self,
        id: impl Into<String>,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        data: Bytes,
    ) -> RemoteFile {
        let id = id.into();
        let file = Self::describe(&id, name.into(), mime_type.into(), Some(data.len() as u64), None);
        self.state
            .lock()
            .await
            .files
            .insert(id, (file.clone(), data));
        file
    }

    /// Make later downloads of `file_id` fail.
    pub async fn fail_downloads_of(&self, file_id: impl Into<String>) {
        self.state
            .lock()
            .await
            .failing_downloads
            .insert(file_id.into());
    }

    pub async fn is_public(&self, file_id: &str) -> bool {
        self.state.lock().await.public.contains(file_id)
    }

    pub async fn contains(&self, file_id: &str) -> bool {
        self.state.lock().await.files.contains_key(file_id)
    }

    fn allocate_id(&self) -> String {
        format!("drive-{:06}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn describe(
        id: &str,
        name: String,
        mime_type: String,
        size: Option<u64>,
        parent_id: Option<&str>,
    ) -> RemoteFile {
        let is_folder = mime_type == FOLDER_MIME_TYPE;
        let now = Utc::now().timestamp();
        RemoteFile {
            id: id.to_string(),
            name,
            mime_type: Some(mime_type),
            size,
            created_at: Some(now),
            modified_at: Some(now),
            is_folder,
            parent_ids: parent_id.map(|p| vec![p.to_string()]).unwrap_or_default(),
            web_view_link: Some(if is_folder {
                folder_url(id)
            } else {
                format!("https://drive.google.com/file/d/{}/view", id)
            }),
            web_content_link: (!is_folder).then(|| view_url(id)),
            thumbnail_link: None,
        }
    }
}

#[async_trait]
impl RemoteFileProvider for InMemoryDriveProvider {
    async fn authenticate(&self) -> bool {
        true
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    fn public_url(&self, file_id: &str) -> String {
        view_url(file_id)
    }

    async fn list_files(
        &self,
        folder_id: Option<&str>,
        _page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let state = self.state.lock().await;
        let mut files: Vec<RemoteFile> = state
            .files
            .values()
            .map(|(file, _)| file.clone())
            .filter(|file| match folder_id {
                Some(folder) => file.parent_ids.iter().any(|p| p == folder),
                None => true,
            })
            .collect();
        files.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((files, None))
    }

    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
        self.state
            .lock()
            .await
            .files
            .get(file_id)
            .map(|(file, _)| file.clone())
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))
    }

    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<RemoteFile>> {
        let state = self.state.lock().await;
        let mut matches: Vec<&RemoteFile> = state
            .files
            .values()
            .map(|(file, _)| file)
            .filter(|file| file.is_folder && file.name == name)
            .filter(|file| match parent_id {
                Some(parent) => file.parent_ids.iter().any(|p| p == parent),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matches.first().map(|file| (*file).clone()))
    }

    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFile> {
        let id = self.allocate_id();
        let folder = Self::describe(
            &id,
            name.to_string(),
            FOLDER_MIME_TYPE.to_string(),
            None,
            parent_id,
        );
        self.state
            .lock()
            .await
            .files
            .insert(id, (folder.clone(), Bytes::new()));
        debug!(folder_id = %folder.id, name, "Created in-memory folder");
        Ok(folder)
    }

    async fn upload_file(
        &self,
        file: UploadFile,
        parent_folder_id: Option<&str>,
        on_progress: Option<UploadProgressFn<'_>>,
    ) -> Result<RemoteFile> {
        let total = file.size();
        if let Some(report) = on_progress {
            let mut sent = 0u64;
            while sent < total {
                sent = (sent + UPLOAD_CHUNK_ALIGNMENT as u64).min(total);
                report(sent, total);
            }
        }

        let id = self.allocate_id();
        let descriptor = Self::describe(
            &id,
            file.name,
            file.mime_type,
            Some(total),
            parent_folder_id,
        );
        self.state
            .lock()
            .await
            .files
            .insert(id, (descriptor.clone(), file.data));
        Ok(descriptor)
    }

    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile> {
        let state = self.state.lock().await;
        if state.failing_downloads.contains(file_id) {
            return Err(BridgeError::OperationFailed(format!(
                "Download of {} failed",
                file_id
            )));
        }
        state
            .files
            .get(file_id)
            .map(|(metadata, data)| DownloadedFile {
                metadata: metadata.clone(),
                data: data.clone(),
            })
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))
    }

    async fn make_file_public(&self, file_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.files.contains_key(file_id) {
            return Err(BridgeError::NotFound(file_id.to_string()));
        }
        state.public.insert(file_id.to_string());
        Ok(())
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.public.remove(file_id);
        state
            .files
            .remove(file_id)
            .map(|_| ())
            .ok_or_else(|| BridgeError::NotFound(file_id.to_string()))
    }
}

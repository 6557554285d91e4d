//! In-memory object store for the stub profile and tests

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{ObjectInfo, ObjectStorage, StoredObject};
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::path::encode_path;

const STUB_PUBLIC_BASE: &str = "https://storage.stub.local/storage/v1/object/public";

struct StoredEntry {
    data: Bytes,
    content_type: String,
}

/// Bucket held in a sorted map.
///
/// Follows the live store's rules: uploads never overwrite and deleting a
/// missing path is not an error. Failures can be switched on to exercise
/// rollback paths.
pub struct InMemoryObjectStorage {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredEntry>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryObjectStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Mutex::new(BTreeMap::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.objects.lock().await.contains_key(path)
    }

    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }

    /// Total bytes held.
    pub async fn total_bytes(&self) -> u64 {
        self.objects
            .lock()
            .await
            .values()
            .map(|entry| entry.data.len() as u64)
            .sum()
    }
}

impl Default for InMemoryObjectStorage {
    fn default() -> Self {
        Self::new("media")
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<StoredObject> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed(format!(
                "Upload of {} failed",
                path
            )));
        }

        let mut objects = self.objects.lock().await;
        if objects.contains_key(path) {
            return Err(BridgeError::OperationFailed(format!(
                "Object already exists: {}",
                path
            )));
        }
        objects.insert(
            path.to_string(),
            StoredEntry {
                data,
                content_type: content_type.to_string(),
            },
        );

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", STUB_PUBLIC_BASE, self.bucket, encode_path(path))
    }

    async fn delete(&self, paths: &[String]) -> Result<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("Delete failed".to_string()));
        }
        let mut objects = self.objects.lock().await;
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .lock()
            .await
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, entry)| ObjectInfo {
                path: path.clone(),
                size: entry.data.len() as u64,
                mime_type: Some(entry.content_type.clone()),
            })
            .collect())
    }

    async fn download(&self, path: &str) -> Result<Bytes> {
        self.objects
            .lock()
            .await
            .get(path)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| BridgeError::NotFound(path.to_string()))
    }
}

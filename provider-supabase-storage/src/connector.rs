//! Supabase Storage REST connector
//!
//! Every request carries the service key both as bearer token and `apikey`
//! header. Uploads are not retried; a failed upload surfaces immediately so
//! the caller can decide what to roll back.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{ObjectInfo, ObjectStorage, StoredObject};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result as StorageResult, StorageError};
use crate::path::encode_path;
use crate::types::{ApiErrorBody, DeleteRequest, ListEntry, ListRequest, SortBy};

const DEFAULT_CACHE_CONTROL_SECS: u64 = 3600;
const LIST_PAGE_SIZE: u32 = 1000;
const API_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Object storage backed by a single Supabase bucket.
pub struct SupabaseStorageConnector {
    http_client: Arc<dyn HttpClient>,
    project_url: String,
    service_key: String,
    bucket: String,
    cache_control_secs: u64,
}

impl SupabaseStorageConnector {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        project_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            project_url: project_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
            cache_control_secs: DEFAULT_CACHE_CONTROL_SECS,
        }
    }

    pub fn with_cache_control(mut self, secs: u64) -> Self {
        self.cache_control_secs = secs;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.project_url,
            self.bucket,
            encode_path(path)
        )
    }

    fn authorized(&self, request: HttpRequest) -> HttpRequest {
        request
            .bearer_token(self.service_key.as_str())
            .header("apikey", self.service_key.clone())
    }

    async fn send(&self, request: HttpRequest) -> StorageResult<HttpResponse> {
        Ok(self.http_client.execute(self.authorized(request)).await?)
    }

    /// Map a non-2xx response, using the JSON error body when present.
    fn api_error(path: &str, response: &HttpResponse) -> StorageError {
        let raw = String::from_utf8_lossy(&response.body).to_string();
        let body: ApiErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
        let code = body.status_code.as_deref().unwrap_or_default();
        let message = body.message.or(body.error).unwrap_or(raw);

        if response.status == 404 || code == "404" || message.to_lowercase().contains("not found")
        {
            return StorageError::ObjectNotFound {
                path: path.to_string(),
            };
        }
        if response.status == 409 || code == "409" || message.contains("already exists") {
            return StorageError::AlreadyExists {
                path: path.to_string(),
            };
        }
        StorageError::ApiError {
            status_code: response.status,
            message,
        }
    }

    async fn upload_inner(
        &self,
        path: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<StoredObject> {
        let size = data.len();
        let request = HttpRequest::new(HttpMethod::Post, self.object_url(path))
            .header("Content-Type", content_type)
            .header(
                "cache-control",
                format!("max-age={}", self.cache_control_secs),
            )
            .header("x-upsert", "false")
            .body(data)
            .timeout(TRANSFER_TIMEOUT);

        let response = self.send(request).await?;
        if !response.is_success() {
            warn!(path, status = response.status, "Object upload rejected");
            return Err(Self::api_error(path, &response));
        }

        info!(path, bytes = size, "Object uploaded");
        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    async fn delete_inner(&self, paths: &[String]) -> StorageResult<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let url = format!("{}/storage/v1/object/{}", self.project_url, self.bucket);
        let request = HttpRequest::new(HttpMethod::Delete, url)
            .json(&DeleteRequest { prefixes: paths })?
            .timeout(API_TIMEOUT);

        let response = self.send(request).await?;
        if !response.is_success() {
            let joined = paths.join(",");
            return Err(Self::api_error(&joined, &response));
        }

        info!(count = paths.len(), "Objects deleted");
        Ok(())
    }

    /// One page of a single folder level.
    async fn list_folder(
        &self,
        folder: &str,
        search: Option<&str>,
        offset: u32,
    ) -> StorageResult<Vec<ListEntry>> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.project_url, self.bucket
        );
        let body = ListRequest {
            prefix: folder,
            limit: LIST_PAGE_SIZE,
            offset,
            search,
            sort_by: SortBy::default(),
        };
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&body)?
            .timeout(API_TIMEOUT);

        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(Self::api_error(folder, &response));
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| StorageError::ParseError(format!("Failed to parse listing: {}", e)))
    }

    /// Walk folders depth-first under `prefix`.
    ///
    /// The listing endpoint is not recursive, so folder entries are
    /// expanded one level at a time.
    async fn list_inner(&self, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        let prefix = prefix.trim_matches('/');
        let (root, search) = match prefix.rsplit_once('/') {
            Some((folder, rest)) if !rest.is_empty() => (folder.to_string(), Some(rest)),
            Some((folder, _)) => (folder.to_string(), None),
            None if prefix.is_empty() => (String::new(), None),
            // A bare category name is treated as a folder.
            None => (prefix.to_string(), None),
        };

        let mut objects = Vec::new();
        let mut pending = vec![(root, search)];

        while let Some((folder, search)) = pending.pop() {
            let mut offset = 0;
            loop {
                let entries = self.list_folder(&folder, search, offset).await?;
                let page_len = entries.len() as u32;

                for entry in entries {
                    let full = if folder.is_empty() {
                        entry.name.clone()
                    } else {
                        format!("{}/{}", folder, entry.name)
                    };
                    if entry.is_folder() {
                        pending.push((full, None));
                    } else {
                        let (size, mime_type) = entry
                            .metadata
                            .map(|m| (m.size, m.mimetype))
                            .unwrap_or((0, None));
                        objects.push(ObjectInfo {
                            path: full,
                            size,
                            mime_type,
                        });
                    }
                }

                if page_len < LIST_PAGE_SIZE {
                    break;
                }
                offset += page_len;
            }
        }

        objects.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    async fn download_inner(&self, path: &str) -> StorageResult<Bytes> {
        let request =
            HttpRequest::new(HttpMethod::Get, self.object_url(path)).timeout(TRANSFER_TIMEOUT);
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(Self::api_error(path, &response));
        }
        Ok(response.body)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorageConnector {
    #[instrument(skip(self, data), fields(bucket = %self.bucket, bytes = data.len()))]
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> Result<StoredObject> {
        Ok(self.upload_inner(path, data, content_type).await?)
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.project_url,
            self.bucket,
            encode_path(path)
        )
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn delete(&self, paths: &[String]) -> Result<()> {
        Ok(self.delete_inner(paths).await?)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self.list_inner(prefix).await?)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn download(&self, path: &str) -> Result<Bytes> {
        Ok(self.download_inner(path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn connector(mock_http: MockHttpClient) -> SupabaseStorageConnector {
        SupabaseStorageConnector::new(
            Arc::new(mock_http),
            "https://proj.supabase.co/",
            "service-key",
            "media",
        )
    }

    #[test]
    fn test_public_url() {
        let c = connector(MockHttpClient::new());
        assert_eq!(
            c.public_url("gallery_image/1700000000000-hero.jpg"),
            "https://proj.supabase.co/storage/v1/object/public/media/gallery_image/1700000000000-hero.jpg"
        );
    }

    #[tokio::test]
    async fn test_upload_sends_cache_and_no_upsert() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Post);
            assert_eq!(
                req.url,
                "https://proj.supabase.co/storage/v1/object/media/banner/1-a.png"
            );
            assert_eq!(req.headers.get("cache-control").unwrap(), "max-age=3600");
            assert_eq!(req.headers.get("x-upsert").unwrap(), "false");
            assert_eq!(req.headers.get("apikey").unwrap(), "service-key");
            assert_eq!(
                req.headers.get("Authorization").unwrap(),
                "Bearer service-key"
            );
            assert_eq!(req.headers.get("Content-Type").unwrap(), "image/png");
            Ok(response(200, r#"{"Key": "media/banner/1-a.png"}"#))
        });

        let stored = connector(mock_http)
            .upload("banner/1-a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(stored.path, "banner/1-a.png");
        assert!(stored.public_url.ends_with("/object/public/media/banner/1-a.png"));
    }

    #[tokio::test]
    async fn test_upload_is_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(503, "unavailable")));

        let result = connector(mock_http)
            .upload("banner/1-a.png", Bytes::from_static(b"png"), "image/png")
            .await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_upload_conflict_maps_to_already_exists() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(response(
                400,
                r#"{"statusCode": "409", "error": "Duplicate", "message": "The resource already exists"}"#,
            ))
        });

        let result = connector(mock_http)
            .upload("banner/1-a.png", Bytes::from_static(b"png"), "image/png")
            .await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(msg)) if msg.contains("already exists")));
    }

    #[tokio::test]
    async fn test_delete_sends_prefixes() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert_eq!(req.method, HttpMethod::Delete);
            assert_eq!(req.url, "https://proj.supabase.co/storage/v1/object/media");
            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap();
            assert_eq!(body["prefixes"][0], "banner/1-a.png");
            Ok(response(200, "[]"))
        });

        let c = connector(mock_http);
        c.delete(&["banner/1-a.png".to_string()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_nothing_skips_request() {
        connector(MockHttpClient::new()).delete(&[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_expands_folders() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap();
            match body["prefix"].as_str().unwrap() {
                "" => Ok(response(200, r#"[{"name": "banner", "id": null}]"#)),
                "banner" => Ok(response(
                    200,
                    r#"[{"name": "1-a.png", "id": "x", "metadata": {"size": 3, "mimetype": "image/png"}}]"#,
                )),
                other => panic!("unexpected prefix {}", other),
            }
        });

        let objects = connector(mock_http).list("").await.unwrap();
        assert_eq!(
            objects,
            vec![ObjectInfo {
                path: "banner/1-a.png".to_string(),
                size: 3,
                mime_type: Some("image/png".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|_| {
            Ok(response(
                400,
                r#"{"statusCode": "404", "error": "not_found", "message": "Object not found"}"#,
            ))
        });

        let result = connector(mock_http).download("banner/missing.png").await;
        assert!(matches!(result, Err(BridgeError::NotFound(p)) if p == "banner/missing.png"));
    }
}

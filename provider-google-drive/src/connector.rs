//! Google Drive API connector implementation
//!
//! Implements [`RemoteFileProvider`] for Google Drive API v3.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::{
    DownloadedFile, RemoteFile, RemoteFileProvider, UploadFile, UploadProgressFn,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::AccessTokenProvider;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{GoogleDriveError, Result as DriveResult};
use crate::types::{
    DriveFile, FileCreateRequest, FilesListResponse, PermissionRequest, FOLDER_MIME_TYPE,
};

/// Google Drive API base URL
const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Media upload endpoint
const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Maximum results per page (Google Drive API limit)
const MAX_PAGE_SIZE: u32 = 1000;

/// Fields to request for file resources
const FILE_FIELDS: &str = "id,name,mimeType,size,createdTime,modifiedTime,parents,trashed,webViewLink,webContentLink,thumbnailLink";

/// Resumable upload chunks must be a multiple of this size, except the last.
pub const UPLOAD_CHUNK_ALIGNMENT: usize = 256 * 1024;

/// 8 MiB
const DEFAULT_CHUNK_SIZE: usize = 32 * UPLOAD_CHUNK_ALIGNMENT;

/// "Resume Incomplete", returned for every accepted non-final chunk.
const RESUME_INCOMPLETE: u16 = 308;

const MAX_RETRIES: u32 = 3;
const API_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Direct view URL usable in `<img>`/`<video>` tags once the file is public.
pub fn view_url(file_id: &str) -> String {
    format!("https://drive.google.com/uc?export=view&id={}", file_id)
}

/// Browser URL of a folder.
pub fn folder_url(folder_id: &str) -> String {
    format!("https://drive.google.com/drive/folders/{}", folder_id)
}

/// Google Drive API connector
///
/// # Features
///
/// - Paginated listing restricted to non-trashed files
/// - Resumable uploads with per-chunk progress
/// - Exponential backoff on 429 and 5xx responses
/// - Bearer tokens fetched per request from the injected provider
///
/// # Example
///
/// ```ignore
/// use provider_google_drive::GoogleDriveConnector;
/// use bridge_traits::storage::RemoteFileProvider;
///
/// let connector = GoogleDriveConnector::new(http_client, auth_manager);
/// let (files, next_page) = connector.list_files(Some(folder_id), None).await?;
/// ```
pub struct GoogleDriveConnector {
    http_client: Arc<dyn HttpClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    api_base: String,
    upload_base: String,
    chunk_size: usize,
    retry_base_delay: Duration,
}

impl GoogleDriveConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http_client,
            tokens,
            api_base: DRIVE_API_BASE.to_string(),
            upload_base: DRIVE_UPLOAD_BASE.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_base_delay: Duration::from_millis(100),
        }
    }

    /// Point the connector at another host, e.g. a local emulator.
    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.upload_base = upload_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Upload chunk size, rounded down to a multiple of
    /// [`UPLOAD_CHUNK_ALIGNMENT`] (at least one unit).
    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = (bytes / UPLOAD_CHUNK_ALIGNMENT).max(1) * UPLOAD_CHUNK_ALIGNMENT;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Parse RFC 3339 timestamp to Unix timestamp
    fn parse_timestamp(rfc3339: Option<&str>) -> Option<i64> {
        rfc3339
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc).timestamp())
    }

    fn convert_file(drive_file: DriveFile) -> RemoteFile {
        let is_folder = drive_file.is_folder();
        let web_view_link = match drive_file.web_view_link {
            Some(link) => Some(link),
            None if is_folder => Some(folder_url(&drive_file.id)),
            None => None,
        };

        RemoteFile {
            size: drive_file.size.and_then(|s| s.parse().ok()),
            created_at: Self::parse_timestamp(drive_file.created_time.as_deref()),
            modified_at: Self::parse_timestamp(drive_file.modified_time.as_deref()),
            mime_type: Some(drive_file.mime_type),
            is_folder,
            parent_ids: drive_file.parents,
            web_view_link,
            web_content_link: drive_file.web_content_link,
            thumbnail_link: drive_file.thumbnail_link,
            id: drive_file.id,
            name: drive_file.name,
        }
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> DriveResult<T> {
        serde_json::from_slice(&response.body)
            .map_err(|e| GoogleDriveError::ParseError(format!("Failed to parse {}: {}", what, e)))
    }

    fn files_url(&self, query: &str, page_size: u32, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/files?q={}&pageSize={}&fields={}",
            self.api_base,
            urlencoding::encode(query),
            page_size,
            urlencoding::encode(&format!("nextPageToken,files({})", FILE_FIELDS)),
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        url
    }

    /// Execute an API request with a fresh bearer token.
    ///
    /// Rate limiting, server errors and transport failures are retried with
    /// exponential backoff. `308` is passed through for resumable uploads.
    #[instrument(skip(self, request), fields(method = ?request.method, resource = %resource))]
    async fn send(&self, request: HttpRequest, resource: &str) -> DriveResult<HttpResponse> {
        let token = self.tokens.access_token().await?;
        let mut attempt = 0;

        loop {
            let outgoing = request.clone().bearer_token(token.as_str());

            let failure = match self.http_client.execute(outgoing).await {
                Ok(response) if response.is_success() || response.status == RESUME_INCOMPLETE => {
                    debug!(status = response.status, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) if response.is_transient() => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(status = response.status, attempt, "API request failed, giving up");
                        return Err(if response.status == 429 {
                            GoogleDriveError::RateLimitExceeded { attempts: attempt }
                        } else {
                            Self::api_error(resource, &response)
                        });
                    }
                    format!("status {}", response.status)
                }
                Ok(response) => {
                    warn!(status = response.status, "API request rejected");
                    return Err(Self::api_error(resource, &response));
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_RETRIES {
                        warn!(error = %e, attempt, "API request failed, giving up");
                        return Err(e.into());
                    }
                    e.to_string()
                }
            };

            let backoff = self.retry_base_delay * 2u32.pow(attempt - 1);
            warn!(
                attempt,
                max_attempts = MAX_RETRIES,
                backoff_ms = backoff.as_millis() as u64,
                reason = %failure,
                "API request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    fn api_error(resource: &str, response: &HttpResponse) -> GoogleDriveError {
        match response.status {
            404 => GoogleDriveError::FileNotFound {
                file_id: resource.to_string(),
            },
            401 => GoogleDriveError::AuthenticationFailed(
                String::from_utf8_lossy(&response.body).to_string(),
            ),
            status => GoogleDriveError::ApiError {
                status_code: status,
                message: String::from_utf8_lossy(&response.body).to_string(),
            },
        }
    }

    async fn list_page(
        &self,
        query: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> DriveResult<(Vec<RemoteFile>, Option<String>)> {
        let url = self.files_url(query, page_size, page_token);
        let request = HttpRequest::new(HttpMethod::Get, url)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT);
        let response = self.send(request, "files").await?;
        let list: FilesListResponse = Self::parse(&response, "files list response")?;

        let files = list
            .files
            .into_iter()
            .filter(|f| !f.trashed)
            .map(Self::convert_file)
            .collect();
        Ok((files, list.next_page_token))
    }

    async fn fetch_metadata(&self, file_id: &str) -> DriveResult<RemoteFile> {
        let url = format!(
            "{}/files/{}?fields={}",
            self.api_base,
            urlencoding::encode(file_id),
            urlencoding::encode(FILE_FIELDS)
        );
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(API_TIMEOUT);
        let response = self.send(request, file_id).await?;
        let drive_file: DriveFile = Self::parse(&response, "file metadata")?;
        Ok(Self::convert_file(drive_file))
    }

    async fn create_folder_inner(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> DriveResult<RemoteFile> {
        let body = FileCreateRequest {
            name,
            mime_type: FOLDER_MIME_TYPE,
            parents: parent_id.into_iter().collect(),
        };
        let url = format!(
            "{}/files?fields={}",
            self.api_base,
            urlencoding::encode(FILE_FIELDS)
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&body)?
            .timeout(API_TIMEOUT);
        let response = self.send(request, name).await?;
        let folder: DriveFile = Self::parse(&response, "created folder")?;

        info!(folder_id = %folder.id, name, "Created Drive folder");
        Ok(Self::convert_file(folder))
    }

    /// Open a resumable session and push the payload chunk by chunk.
    async fn resumable_upload(
        &self,
        file: &UploadFile,
        parent_folder_id: Option<&str>,
        on_progress: Option<UploadProgressFn<'_>>,
    ) -> DriveResult<RemoteFile> {
        let total = file.size();
        let metadata = FileCreateRequest {
            name: &file.name,
            mime_type: &file.mime_type,
            parents: parent_folder_id.into_iter().collect(),
        };

        let init_url = format!(
            "{}/files?uploadType=resumable&fields={}",
            self.upload_base,
            urlencoding::encode(FILE_FIELDS)
        );
        let init = HttpRequest::new(HttpMethod::Post, init_url)
            .header("X-Upload-Content-Type", file.mime_type.clone())
            .header("X-Upload-Content-Length", total.to_string())
            .json(&metadata)?
            .timeout(API_TIMEOUT);
        let response = self.send(init, &file.name).await?;
        let session_url = response
            .header("Location")
            .ok_or_else(|| {
                GoogleDriveError::UploadFailed("no session URI in response".to_string())
            })?
            .to_string();

        debug!(total, chunk_size = self.chunk_size, "Resumable session opened");

        if total == 0 {
            let request = HttpRequest::new(HttpMethod::Put, session_url)
                .header("Content-Range", "bytes */0")
                .body(Bytes::new())
                .timeout(API_TIMEOUT);
            let response = self.send(request, &file.name).await?;
            if let Some(report) = on_progress {
                report(0, 0);
            }
            return Ok(Self::convert_file(Self::parse(&response, "uploaded file")?));
        }

        let mut offset: u64 = 0;
        loop {
            let end = (offset + self.chunk_size as u64).min(total);
            let chunk = file.data.slice(offset as usize..end as usize);
            let request = HttpRequest::new(HttpMethod::Put, session_url.clone())
                .header("Content-Range", format!("bytes {}-{}/{}", offset, end - 1, total))
                .body(chunk)
                .timeout(TRANSFER_TIMEOUT);
            let response = self.send(request, &file.name).await?;

            if response.status != RESUME_INCOMPLETE {
                if let Some(report) = on_progress {
                    report(total, total);
                }
                let uploaded: DriveFile = Self::parse(&response, "uploaded file")?;
                info!(file_id = %uploaded.id, bytes = total, "Upload completed");
                return Ok(Self::convert_file(uploaded));
            }

            // The server may persist fewer bytes than sent; resume from what it holds.
            let next = response
                .header("Range")
                .and_then(parse_range_end)
                .map(|last| last + 1)
                .unwrap_or(end);
            if next <= offset || next >= total {
                return Err(GoogleDriveError::UploadFailed(format!(
                    "unexpected resume offset {} after sending bytes {}-{}",
                    next,
                    offset,
                    end - 1
                )));
            }
            offset = next;
            if let Some(report) = on_progress {
                report(offset, total);
            }
        }
    }

    async fn download_inner(&self, file_id: &str) -> DriveResult<DownloadedFile> {
        let metadata = self.fetch_metadata(file_id).await?;
        let url = format!(
            "{}/files/{}?alt=media",
            self.api_base,
            urlencoding::encode(file_id)
        );
        let request = HttpRequest::new(HttpMethod::Get, url).timeout(TRANSFER_TIMEOUT);
        let response = self.send(request, file_id).await?;

        info!(file_id, bytes = response.body.len(), "Downloaded file");
        Ok(DownloadedFile {
            metadata,
            data: response.body,
        })
    }

    async fn make_public_inner(&self, file_id: &str) -> DriveResult<()> {
        let url = format!(
            "{}/files/{}/permissions",
            self.api_base,
            urlencoding::encode(file_id)
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .json(&PermissionRequest::public_reader())?
            .timeout(API_TIMEOUT);
        self.send(request, file_id).await?;
        debug!(file_id, "Granted public read access");
        Ok(())
    }

    async fn delete_inner(&self, file_id: &str) -> DriveResult<()> {
        let url = format!("{}/files/{}", self.api_base, urlencoding::encode(file_id));
        let request = HttpRequest::new(HttpMethod::Delete, url).timeout(API_TIMEOUT);
        self.send(request, file_id).await?;
        info!(file_id, "Deleted Drive file");
        Ok(())
    }
}

/// Escape a literal for use inside a single-quoted Drive query string.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Last byte index from a `Range: bytes=0-N` header.
fn parse_range_end(header: &str) -> Option<u64> {
    header
        .trim()
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}

#[async_trait]
impl RemoteFileProvider for GoogleDriveConnector {
    async fn authenticate(&self) -> bool {
        match self.tokens.authenticate().await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                warn!(error = %e, "Drive authentication failed");
                false
            }
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated().await
    }

    fn public_url(&self, file_id: &str) -> String {
        view_url(file_id)
    }

    #[instrument(skip(self))]
    async fn list_files(
        &self,
        folder_id: Option<&str>,
        page_token: Option<String>,
    ) -> Result<(Vec<RemoteFile>, Option<String>)> {
        let mut query = "trashed = false".to_string();
        if let Some(folder) = folder_id {
            query.push_str(&format!(" and '{}' in parents", escape_query_literal(folder)));
        }

        let (files, next) = self
            .list_page(&query, MAX_PAGE_SIZE, page_token.as_deref())
            .await?;
        info!(count = files.len(), has_more = next.is_some(), "Listed Drive files");
        Ok((files, next))
    }

    #[instrument(skip(self))]
    async fn get_metadata(&self, file_id: &str) -> Result<RemoteFile> {
        Ok(self.fetch_metadata(file_id).await?)
    }

    #[instrument(skip(self))]
    async fn find_folder_by_name(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Option<RemoteFile>> {
        let mut query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query_literal(name),
            FOLDER_MIME_TYPE
        );
        if let Some(parent) = parent_id {
            query.push_str(&format!(" and '{}' in parents", escape_query_literal(parent)));
        }

        let (mut folders, _) = self.list_page(&query, 1, None).await?;
        Ok(if folders.is_empty() {
            None
        } else {
            Some(folders.swap_remove(0))
        })
    }

    #[instrument(skip(self))]
    async fn create_folder(&self, name: &str, parent_id: Option<&str>) -> Result<RemoteFile> {
        Ok(self.create_folder_inner(name, parent_id).await?)
    }

    #[instrument(skip(self, file, on_progress), fields(name = %file.name, size = file.size()))]
    async fn upload_file(
        &self,
        file: UploadFile,
        parent_folder_id: Option<&str>,
        on_progress: Option<UploadProgressFn<'_>>,
    ) -> Result<RemoteFile> {
        Ok(self
            .resumable_upload(&file, parent_folder_id, on_progress)
            .await?)
    }

    #[instrument(skip(self))]
    async fn download_file(&self, file_id: &str) -> Result<DownloadedFile> {
        Ok(self.download_inner(file_id).await?)
    }

    #[instrument(skip(self))]
    async fn make_file_public(&self, file_id: &str) -> Result<()> {
        Ok(self.make_public_inner(file_id).await?)
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, file_id: &str) -> Result<()> {
        Ok(self.delete_inner(file_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use core_auth::StubTokenProvider;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

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

    fn connector(mock_http: MockHttpClient) -> GoogleDriveConnector {
        GoogleDriveConnector::new(
            Arc::new(mock_http),
            Arc::new(StubTokenProvider::with_token("test_token")),
        )
        .with_retry_base_delay(Duration::from_millis(1))
    }

    const FILE_JSON: &str = r#"{
        "id": "abc123",
        "name": "hero.jpg",
        "mimeType": "image/jpeg",
        "size": "2097152",
        "createdTime": "2024-01-01T00:00:00.000Z",
        "modifiedTime": "2024-01-01T00:00:00.000Z",
        "webViewLink": "https://drive.google.com/file/d/abc123/view",
        "parents": ["parent1"]
    }"#;

    #[test]
    fn test_convert_file_and_folder() {
        let file: DriveFile = serde_json::from_str(FILE_JSON).unwrap();
        let remote = GoogleDriveConnector::convert_file(file);
        assert_eq!(remote.size, Some(2_097_152));
        assert_eq!(remote.created_at, Some(1_704_067_200));
        assert!(!remote.is_folder);

        let folder: DriveFile = serde_json::from_str(
            r#"{"id": "f1", "name": "Photos", "mimeType": "application/vnd.google-apps.folder"}"#,
        )
        .unwrap();
        let remote = GoogleDriveConnector::convert_file(folder);
        assert!(remote.is_folder);
        assert_eq!(remote.size, None);
        assert_eq!(
            remote.web_view_link.as_deref(),
            Some("https://drive.google.com/drive/folders/f1")
        );
    }

    #[test]
    fn test_url_helpers_and_parsing() {
        assert_eq!(
            view_url("abc123"),
            "https://drive.google.com/uc?export=view&id=abc123"
        );
        assert_eq!(parse_range_end("bytes=0-262143"), Some(262_143));
        assert_eq!(parse_range_end("garbage"), None);
        assert_eq!(escape_query_literal("Bob's \\ party"), "Bob\\'s \\\\ party");
    }

    #[test]
    fn test_chunk_size_alignment() {
        let c = connector(MockHttpClient::new()).with_chunk_size(300 * 1024);
        assert_eq!(c.chunk_size(), UPLOAD_CHUNK_ALIGNMENT);
        let c = connector(MockHttpClient::new()).with_chunk_size(10);
        assert_eq!(c.chunk_size(), UPLOAD_CHUNK_ALIGNMENT);
    }

    #[tokio::test]
    async fn test_list_files_in_folder() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|req| {
                assert_eq!(
                    req.headers.get("Authorization").map(String::as_str),
                    Some("Bearer test_token")
                );
                assert!(req.url.contains("in%20parents"));
                assert!(req.url.contains("pageToken=page2"));
                Ok(response(
                    200,
                    &format!(r#"{{"files": [{}], "nextPageToken": "page3"}}"#, FILE_JSON),
                ))
            });

        let (files, next) = connector(mock_http)
            .list_files(Some("folder1"), Some("page2".to_string()))
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].id, "abc123");
        assert_eq!(next.as_deref(), Some("page3"));
    }

    #[tokio::test]
    async fn test_find_folder_by_name_none() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|req| {
                assert!(req.url.contains("pageSize=1"));
                Ok(response(200, r#"{"files": []}"#))
            });

        let found = connector(mock_http)
            .find_folder_by_name("Boujee Homepage Media", None)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_event_folder_tree() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(move |req| {
            assert_eq!(req.method, HttpMethod::Post);
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap();
            Ok(response(
                200,
                &format!(
                    r#"{{"id": "folder{}", "name": {}, "mimeType": "application/vnd.google-apps.folder"}}"#,
                    n, body["name"]
                ),
            ))
        });

        let links = connector(mock_http)
            .create_event_folder("Gala", "evt-1")
            .await
            .unwrap();

        assert_eq!(created.load(Ordering::SeqCst), 3);
        assert_eq!(links.folder_id, "folder0");
        assert_eq!(links.photos_folder_id, "folder1");
        assert_eq!(links.videos_folder_id, "folder2");
        assert_eq!(links.folder_url, folder_url("folder0"));
    }

    #[tokio::test]
    async fn test_resumable_upload_reports_monotonic_progress() {
        let total = 2 * UPLOAD_CHUNK_ALIGNMENT + 100;

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(4).returning(move |req| {
            if req.url.contains("uploadType=resumable") {
                assert_eq!(
                    req.headers.get("X-Upload-Content-Length").map(String::as_str),
                    Some(total.to_string().as_str())
                );
                let mut r = response(200, "");
                r.headers
                    .insert("location".to_string(), "https://upload.test/session".to_string());
                return Ok(r);
            }

            assert_eq!(req.url, "https://upload.test/session");
            let range = req.headers.get("Content-Range").cloned().unwrap_or_default();
            let (span, _) = range
                .trim_start_matches("bytes ")
                .split_once('/')
                .unwrap();
            let end: usize = span.split('-').nth(1).unwrap().parse().unwrap();
            assert!(req.body.as_ref().is_some_and(|b| !b.is_empty()));

            if end + 1 == total {
                Ok(response(200, FILE_JSON))
            } else {
                let mut r = response(308, "");
                r.headers
                    .insert("Range".to_string(), format!("bytes=0-{}", end));
                Ok(r)
            }
        });

        let progress = Mutex::new(Vec::new());
        let record = |sent: u64, of: u64| progress.lock().unwrap().push((sent, of));

        let file = UploadFile::new("hero.jpg", "image/jpeg", Bytes::from(vec![7u8; total]));
        let uploaded = connector(mock_http)
            .with_chunk_size(UPLOAD_CHUNK_ALIGNMENT)
            .upload_file(file, Some("parent1"), Some(&record))
            .await
            .unwrap();

        assert_eq!(uploaded.id, "abc123");
        let total = total as u64;
        let chunk = UPLOAD_CHUNK_ALIGNMENT as u64;
        assert_eq!(
            *progress.lock().unwrap(),
            vec![(chunk, total), (2 * chunk, total), (total, total)]
        );
    }

    #[tokio::test]
    async fn test_upload_without_session_uri_fails() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(200, "")));

        let file = UploadFile::new("a.png", "image/png", Bytes::from_static(b"png"));
        let result = connector(mock_http).upload_file(file, None, None).await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_download_file_fetches_metadata_and_media() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(2).returning(|req| {
            if req.url.contains("alt=media") {
                Ok(HttpResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: Bytes::from(vec![1, 2, 3, 4, 5]),
                })
            } else {
                Ok(response(200, FILE_JSON))
            }
        });

        let downloaded = connector(mock_http).download_file("abc123").await.unwrap();
        assert_eq!(downloaded.metadata.mime_type.as_deref(), Some("image/jpeg"));
        assert_eq!(&downloaded.data[..], &[1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_make_file_public_grants_anyone_reader() {
        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(1).returning(|req| {
            assert!(req.url.ends_with("/files/abc123/permissions"));
            let body: serde_json::Value =
                serde_json::from_slice(req.body.as_deref().unwrap_or_default()).unwrap();
            assert_eq!(body["type"], "anyone");
            assert_eq!(body["role"], "reader");
            Ok(response(200, r#"{"id": "anyoneWithLink"}"#))
        });

        connector(mock_http).make_file_public("abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut mock_http = MockHttpClient::new();
        mock_http.expect_execute().times(3).returning(move |_| {
            if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                Ok(response(503, "backend error"))
            } else {
                Ok(response(200, FILE_JSON))
            }
        });

        let file = connector(mock_http).get_metadata("abc123").await.unwrap();
        assert_eq!(file.id, "abc123");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(MAX_RETRIES as usize)
            .returning(|_| Ok(response(429, "rateLimitExceeded")));

        let result = connector(mock_http).get_metadata("abc123").await;
        assert!(matches!(result, Err(BridgeError::OperationFailed(msg)) if msg.contains("Rate limit")));
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, "File not found")));

        let result = connector(mock_http).get_metadata("missing").await;
        assert!(matches!(result, Err(BridgeError::NotFound(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_authenticate_delegates_to_token_provider() {
        let c = connector(MockHttpClient::new());
        assert!(c.authenticate().await);
        assert!(c.is_authenticated().await);
    }
}

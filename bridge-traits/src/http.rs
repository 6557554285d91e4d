//! HTTP client seam used by the Drive, Supabase and OAuth adapters.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

/// Outgoing request.
///
/// Header names are kept as given; adapters use the canonical casing.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Overrides the client-wide timeout for this request only.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.into()))
    }

    pub fn content_type(self, mime_type: impl Into<String>) -> Self {
        self.header("Content-Type", mime_type)
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        Ok(self
            .content_type("application/json")
            .body(Bytes::from(encoded)))
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

/// Fully buffered response.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        is_transient_status(self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Statuses a client may retry on: rate limiting and server errors.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// How many times, and how patiently, a client retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// A single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Async HTTP transport.
///
/// Bearer tokens are attached by the caller; the client never refreshes
/// them. Non-2xx responses are returned as responses, not errors; only
/// transport failures (DNS, TLS, timeouts, exhausted retries) are `Err`.
///
/// ```ignore
/// let request = HttpRequest::new(HttpMethod::Get, "https://www.googleapis.com/drive/v3/files")
///     .bearer_token(token);
/// let files: FileList = client.execute(request).await?.json()?;
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Execute with an explicit retry policy.
    ///
    /// The default ignores the policy and makes a single attempt.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let _ = policy;
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::new(),
        }
    }

    #[test]
    fn test_upload_request_builder() {
        let request = HttpRequest::new(HttpMethod::Post, "https://storage.test/object/media/a.png")
            .bearer_token("service-key")
            .content_type("image/png")
            .header("x-upsert", "false")
            .body(Bytes::from_static(b"png"))
            .timeout(Duration::from_secs(120));

        assert_eq!(request.headers["Authorization"], "Bearer service-key");
        assert_eq!(request.headers["Content-Type"], "image/png");
        assert_eq!(request.body.as_deref(), Some(&b"png"[..]));
        assert_eq!(request.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://drive.test/permissions")
            .json(&serde_json::json!({ "role": "reader", "type": "anyone" }))
            .unwrap();

        assert_eq!(request.headers["Content-Type"], "application/json");
        let body: serde_json::Value = serde_json::from_slice(request.body.as_ref().unwrap()).unwrap();
        assert_eq!(body["role"], "reader");
    }

    #[test]
    fn test_status_classes() {
        assert!(response(201, &[]).is_success());
        assert!(response(404, &[]).is_client_error());
        assert!(!response(404, &[]).is_transient());
        assert!(response(429, &[]).is_transient());
        assert!(response(503, &[]).is_transient());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let resumable = response(200, &[("Location", "https://upload.test/session")]);
        assert_eq!(resumable.header("location"), Some("https://upload.test/session"));
        assert_eq!(resumable.header("range"), None);
    }

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            use_exponential_backoff: true,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));

        let flat = RetryPolicy {
            use_exponential_backoff: false,
            ..policy
        };
        assert_eq!(flat.delay_for(4), Duration::from_millis(100));
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }
}

//! `HttpClient` over reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{is_transient_status, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("boujee-media-core/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled reqwest client with rustls.
///
/// Retries 429 and 5xx responses and transport failures with exponential
/// backoff. Per-request timeouts override the client default, which matters
/// for large Drive downloads and resumable upload chunks.
pub struct ReqwestHttpClient {
    client: Client,
}

/// What one attempt produced.
enum Attempt {
    Done(HttpResponse),
    Retry(BridgeError),
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default reqwest client");
                Client::new()
            });

        Self { client }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    fn build(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }

    async fn attempt(&self, request: &HttpRequest) -> Result<Attempt> {
        let response = match self.build(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Ok(Attempt::Retry(BridgeError::OperationFailed(
                    "Request timed out".to_string(),
                )))
            }
            Err(e) if e.is_connect() => {
                return Ok(Attempt::Retry(BridgeError::OperationFailed(format!(
                    "Connection failed: {}",
                    e
                ))))
            }
            Err(e) => return Ok(Attempt::Retry(BridgeError::OperationFailed(e.to_string()))),
        };

        let status = response.status().as_u16();
        if is_transient_status(status) {
            return Ok(Attempt::Retry(BridgeError::OperationFailed(format!(
                "HTTP {} from {}",
                status, request.url
            ))));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to read body: {}", e)))?;

        Ok(Attempt::Done(HttpResponse {
            status,
            headers,
            body,
        }))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let attempts = policy.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            debug!(attempt, attempts, url = %request.url, "HTTP request");
            match self.attempt(&request).await? {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(e) => {
                    warn!(attempt, error = %e, "HTTP attempt failed");
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                let delay = policy.delay_for(attempt);
                debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                sleep(delay).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BridgeError::OperationFailed("All retry attempts exhausted".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(200));
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            use_exponential_backoff: false,
        };

        // Nothing listens on the loopback discard port.
        let request = HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/");
        let result = client.execute_with_retry(request, policy).await;

        assert!(matches!(result, Err(BridgeError::OperationFailed(_))));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Put), reqwest::Method::PUT);
        assert_eq!(ReqwestHttpClient::method(HttpMethod::Delete), reqwest::Method::DELETE);
    }

    #[test]
    fn test_request_carries_headers_and_timeout() {
        let client = ReqwestHttpClient::new();
        let request = HttpRequest::new(HttpMethod::Post, "https://storage.test/object/media/x")
            .content_type("video/mp4")
            .timeout(Duration::from_secs(120));

        let built = client.build(&request).build().unwrap();
        assert_eq!(built.method(), reqwest::Method::POST);
        assert_eq!(built.headers()["content-type"], "video/mp4");
        assert_eq!(built.timeout(), Some(&Duration::from_secs(120)));
    }
}

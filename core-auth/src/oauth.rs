//! OAuth 2.0 authorization code flow with PKCE
//!
//! Implements RFC 6749 and RFC 7636 against Google's endpoints:
//! - building the consent URL with an S256 challenge
//! - exchanging the callback code for tokens
//! - refreshing access tokens with bounded retries
//!
//! Codes, verifiers and tokens are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig::google_drive(
//!     "client-id",
//!     Some("client-secret".to_string()),
//!     "http://localhost:8080/callback",
//! );
//! let flow = OAuthFlowManager::new(config, http_client);
//! let (auth_url, verifier) = flow.build_auth_url()?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// Access limited to files the application created or opened.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// OAuth client registration and endpoints.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Absent for public (installed app) clients.
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Google Drive client limited to the `drive.file` scope.
    pub fn google_drive(
        client_id: impl Into<String>,
        client_secret: Option<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            scopes: vec![DRIVE_FILE_SCOPE.to_string()],
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// PKCE code verifier plus the CSRF state sent with the consent URL.
///
/// Only the challenge derived from the verifier leaves the process before
/// the code exchange.
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// 32 random bytes of verifier and 16 of state, both URL-safe base64.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the authorization code flow against the configured endpoints.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the consent URL. The returned verifier must be kept until the
    /// callback arrives.
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("state", verifier.state());
            query.append_pair("code_challenge", &challenge);
            query.append_pair("code_challenge_method", "S256");
            // Offline access plus forced consent so a refresh token comes back.
            query.append_pair("access_type", "offline");
            query.append_pair("prompt", "consent");
        }

        debug!("Built authorization URL");
        Ok((url.to_string(), verifier))
    }

    /// Exchange the callback code for tokens after checking the CSRF state.
    #[instrument(skip(self, code, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", self.config.redirect_uri.as_str());
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("code_verifier", verifier.verifier());
        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret.as_str());
        }

        let request = self.token_request(&params)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(
                status = response.status,
                error = %error_body,
                "Token endpoint rejected authorization code"
            );
            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                response.status, error_body
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))?;

        info!(
            expires_in = token_response.expires_in,
            has_refresh_token = token_response.refresh_token.is_some(),
            "Exchanged authorization code for tokens"
        );

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
        ))
    }

    /// Trade a refresh token for a new access token.
    ///
    /// Server errors are retried with exponential backoff; 4xx responses
    /// (revoked or invalid grant) fail immediately. The old refresh token is
    /// kept when the response does not rotate it.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", self.config.client_id.as_str());
        if let Some(ref client_secret) = self.config.client_secret {
            params.insert("client_secret", client_secret.as_str());
        }

        let request = self.token_request(&params)?;
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self
                .http_client
                .execute(request.clone())
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json().map_err(|e| {
                    AuthError::Other(format!("Failed to parse token response: {}", e))
                })?;

                info!(
                    expires_in = token_response.expires_in,
                    "Refreshed access token"
                );

                return Ok(OAuthTokens::new(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .or_else(|| Some(refresh_token.to_string())),
                    token_response.expires_in,
                ));
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() {
                warn!(status, error = %error_body, "Token refresh rejected");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    fn token_request(&self, params: &HashMap<&str, &str>) -> Result<HttpRequest> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;

        Ok(
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Bytes::from(encoded)),
        )
    }
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;

    mock! {
        pub Http {}

        #[async_trait::async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    pub(crate) fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig {
            client_id: "test-client".to_string(),
            client_secret: Some("secret".to_string()),
            redirect_uri: "http://localhost:8080/callback".to_string(),
            scopes: vec!["scope1".to_string(), "scope2".to_string()],
            auth_url: "https://provider.com/auth".to_string(),
            token_url: "https://provider.com/token".to_string(),
        }
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();
        assert!(!verifier.verifier().is_empty());
        assert!(!verifier.state().is_empty());
        assert_eq!(verifier.challenge(), verifier.challenge());

        let other = PkceVerifier::new();
        assert_ne!(verifier.verifier(), other.verifier());
        assert_ne!(verifier.state(), other.state());
    }

    #[test]
    fn test_pkce_challenge_is_url_safe() {
        let verifier = PkceVerifier {
            verifier: "test_verifier".to_string(),
            state: "test_state".to_string(),
        };
        let challenge = verifier.challenge();
        assert!(!challenge.contains('+'));
        assert!(!challenge.contains('/'));
        assert!(!challenge.contains('='));
    }

    #[test]
    fn test_google_drive_config() {
        let config = OAuthConfig::google_drive("id", None, "http://localhost/cb");
        assert_eq!(config.scopes, vec![DRIVE_FILE_SCOPE.to_string()]);
        assert_eq!(config.token_url, GOOGLE_TOKEN_URL);
        assert!(!format!("{:?}", OAuthConfig::google_drive("id", Some("s3cr3t".into()), "x"))
            .contains("s3cr3t"));
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(test_config(), Arc::new(MockHttp::new()));
        let (url, verifier) = manager.build_auth_url().unwrap();

        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=scope1+scope2") || url.contains("scope=scope1%20scope2"));
        assert!(url.contains(&format!("state={}", verifier.state())));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut config = test_config();
        config.auth_url = "not a valid url".to_string();
        let manager = OAuthFlowManager::new(config, Arc::new(MockHttp::new()));
        assert!(manager.build_auth_url().is_err());
    }

    #[tokio::test]
    async fn test_exchange_code_rejects_state_mismatch() {
        let manager = OAuthFlowManager::new(test_config(), Arc::new(MockHttp::new()));
        let verifier = PkceVerifier::new();

        let result = manager.exchange_code("code", "forged", &verifier).await;
        assert!(matches!(result, Err(AuthError::StateMismatch { .. })));
    }

    #[tokio::test]
    async fn test_exchange_code_success() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                let body = String::from_utf8_lossy(req.body.as_deref().unwrap_or_default());
                req.url == "https://provider.com/token"
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code_verifier=")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"at","refresh_token":"rt","expires_in":3599}"#,
                ))
            });

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();
        let state = verifier.state().to_string();

        let tokens = manager.exchange_code("code", &state, &verifier).await.unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.refresh_token(), Some("rt"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let verifier = PkceVerifier::new();
        let state = verifier.state().to_string();

        let result = manager.exchange_code("bad", &state, &verifier).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthCode(_))));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_not_rotated() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"new"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let tokens = manager.refresh_access_token("old-refresh").await.unwrap();

        assert_eq!(tokens.access_token, "new");
        assert_eq!(tokens.refresh_token(), Some("old-refresh"));
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn test_refresh_does_not_retry_client_errors() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(401, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.refresh_access_token("revoked").await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(MAX_REFRESH_ATTEMPTS as usize)
            .returning(|_| Ok(json_response(503, "unavailable")));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.refresh_access_token("rt").await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[test]
    fn test_token_response_defaults() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"x"}"#).unwrap();
        assert_eq!(parsed.expires_in, 3600);
        assert!(parsed.refresh_token.is_none());
    }
}

//! # Authentication Manager
//!
//! Owns the Drive account's OAuth session: loads persisted tokens at
//! startup, runs the consent flow, refreshes access tokens before they
//! expire and reports state changes on the [`EventBus`].
//!
//! ## Usage
//!
//! ```no_run
//! use core_auth::{AuthManager, OAuthConfig, TokenStore};
//! use core_runtime::events::EventBus;
//! use std::sync::Arc;
//! # use bridge_traits::{http::HttpClient, SecureStore};
//!
//! # async fn example() -> core_auth::Result<()> {
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! # let secure_store: Arc<dyn SecureStore> = todo!();
//! let config = OAuthConfig::google_drive("client-id", None, "http://localhost:8080/callback");
//! let manager = AuthManager::new(
//!     "drive",
//!     config,
//!     TokenStore::new(secure_store),
//!     http_client,
//!     EventBus::new(100),
//! );
//!
//! if !manager.initialize().await? {
//!     let url = manager.begin_sign_in().await?;
//!     println!("Open {url} and paste the code back");
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier};
use crate::provider::AccessTokenProvider;
use crate::token_store::TokenStore;
use crate::types::{AuthState, OAuthTokens};
use async_trait::async_trait;
use bridge_traits::http::HttpClient;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound for a single token endpoint round trip, retries included.
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(120);

/// OAuth session for a single remote account.
///
/// Refreshes are serialized by an internal lock, so concurrent callers of
/// [`access_token`](AccessTokenProvider::access_token) trigger at most one
/// round trip to the token endpoint.
pub struct AuthManager {
    account: String,
    oauth: OAuthFlowManager,
    token_store: TokenStore,
    event_bus: EventBus,
    tokens: RwLock<Option<OAuthTokens>>,
    state: RwLock<AuthState>,
    pending_sign_in: Mutex<Option<PkceVerifier>>,
    refresh_lock: Mutex<()>,
    auth_timeout: Duration,
}

impl AuthManager {
    pub fn new(
        account: impl Into<String>,
        config: OAuthConfig,
        token_store: TokenStore,
        http_client: Arc<dyn HttpClient>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            account: account.into(),
            oauth: OAuthFlowManager::new(config, http_client),
            token_store,
            event_bus,
            tokens: RwLock::new(None),
            state: RwLock::new(AuthState::SignedOut),
            pending_sign_in: Mutex::new(None),
            refresh_lock: Mutex::new(()),
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, auth_timeout: Duration) -> Self {
        self.auth_timeout = auth_timeout;
        self
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    /// Load persisted tokens into memory.
    ///
    /// Returns whether the loaded token is still usable. A corrupted entry
    /// is treated as signed out.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn initialize(&self) -> Result<bool> {
        let loaded = match self.token_store.retrieve_tokens(&self.account).await {
            Ok(tokens) => tokens,
            Err(AuthError::TokenCorrupted { reason, .. }) => {
                warn!(%reason, "Discarded corrupted tokens");
                None
            }
            Err(e) => return Err(e),
        };

        let valid = loaded.as_ref().is_some_and(OAuthTokens::is_valid);
        let has_tokens = loaded.is_some();
        *self.tokens.write().await = loaded;
        self.set_state(if has_tokens {
            AuthState::SignedIn
        } else {
            AuthState::SignedOut
        })
        .await;

        info!(has_tokens, valid, "Auth session initialized");
        Ok(valid)
    }

    /// Start the consent flow and return the URL to open.
    ///
    /// Starting again replaces the earlier pending flow.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn begin_sign_in(&self) -> Result<String> {
        let (auth_url, verifier) = self.oauth.build_auth_url()?;

        let mut pending = self.pending_sign_in.lock().await;
        if pending.is_some() {
            debug!("Replacing pending sign-in");
        }
        *pending = Some(verifier);
        drop(pending);

        self.set_state(AuthState::SigningIn).await;
        self.emit(AuthEvent::SigningIn {
            account: self.account.clone(),
        });

        info!("Sign-in flow started");
        Ok(auth_url)
    }

    /// Finish the consent flow with the code and state from the callback.
    #[instrument(skip(self, code, state), fields(account = %self.account))]
    pub async fn complete_sign_in(&self, code: &str, state: &str) -> Result<()> {
        let verifier = self
            .pending_sign_in
            .lock()
            .await
            .take()
            .ok_or_else(|| AuthError::NoSignInInProgress {
                account: self.account.clone(),
            })?;

        let exchanged = timeout(
            self.auth_timeout,
            self.oauth.exchange_code(code, state, &verifier),
        )
        .await;

        let tokens = match exchanged {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(e)) => {
                error!(error = %e, "Authorization code exchange failed");
                self.set_state(AuthState::SignedOut).await;
                self.emit_error(format!("Sign-in failed: {}", e), false);
                return Err(e);
            }
            Err(_) => {
                self.set_state(AuthState::SignedOut).await;
                self.emit_error("Authentication timeout".to_string(), true);
                return Err(AuthError::OperationTimeout {
                    operation: "token exchange".to_string(),
                });
            }
        };

        if let Err(e) = self.token_store.store_tokens(&self.account, &tokens).await {
            error!(error = %e, "Failed to persist tokens");
            self.emit_error(format!("Failed to store credentials: {}", e), false);
            return Err(e);
        }

        *self.tokens.write().await = Some(tokens);
        self.set_state(AuthState::SignedIn).await;
        self.emit(AuthEvent::SignedIn {
            account: self.account.clone(),
        });

        info!("Sign-in completed");
        Ok(())
    }

    /// Forget the session and erase persisted tokens.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn sign_out(&self) -> Result<()> {
        self.token_store.delete_tokens(&self.account).await?;
        *self.tokens.write().await = None;
        *self.pending_sign_in.lock().await = None;
        self.set_state(AuthState::SignedOut).await;
        self.emit(AuthEvent::SignedOut {
            account: self.account.clone(),
        });
        info!("Signed out");
        Ok(())
    }

    async fn current_tokens(&self) -> Result<Option<OAuthTokens>> {
        if let Some(tokens) = self.tokens.read().await.clone() {
            return Ok(Some(tokens));
        }

        // Lazily pick up tokens written by another process.
        let loaded = self.token_store.retrieve_tokens(&self.account).await?;
        if loaded.is_some() {
            *self.tokens.write().await = loaded.clone();
        }
        Ok(loaded)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<OAuthTokens> {
        self.set_state(AuthState::TokenRefreshing).await;
        self.emit(AuthEvent::TokenRefreshing {
            account: self.account.clone(),
        });

        let refreshed = match timeout(
            self.auth_timeout,
            self.oauth.refresh_access_token(refresh_token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AuthError::OperationTimeout {
                operation: "token refresh".to_string(),
            }),
        };

        let tokens = match refreshed {
            Ok(tokens) => tokens,
            Err(e) => {
                self.set_state(AuthState::SignedIn).await;
                self.emit_error(format!("Token refresh failed: {}", e), true);
                return Err(e);
            }
        };

        self.token_store.store_tokens(&self.account, &tokens).await?;
        *self.tokens.write().await = Some(tokens.clone());
        self.set_state(AuthState::SignedIn).await;
        self.emit(AuthEvent::TokenRefreshed {
            account: self.account.clone(),
            expires_at: tokens.expires_at.timestamp().max(0) as u64,
        });

        info!("Access token refreshed");
        Ok(tokens)
    }

    async fn set_state(&self, state: AuthState) {
        *self.state.write().await = state;
    }

    fn emit(&self, event: AuthEvent) {
        let _ = self.event_bus.emit(CoreEvent::Auth(event));
    }

    fn emit_error(&self, message: String, recoverable: bool) {
        self.emit(AuthEvent::AuthError {
            account: Some(self.account.clone()),
            message,
            recoverable,
        });
    }
}

#[async_trait]
impl AccessTokenProvider for AuthManager {
    #[instrument(skip(self), fields(account = %self.account))]
    async fn authenticate(&self) -> Result<bool> {
        let _guard = self.refresh_lock.lock().await;

        let Some(tokens) = self.current_tokens().await? else {
            debug!("No stored tokens, consent required");
            return Ok(false);
        };

        if !tokens.is_expired() {
            return Ok(true);
        }

        let Some(refresh_token) = tokens.refresh_token.clone() else {
            warn!("Token expiring and no refresh token held");
            return Ok(tokens.is_valid());
        };

        match self.refresh(&refresh_token).await {
            Ok(_) => Ok(true),
            // Still inside the buffer window: keep serving the old token.
            Err(e) if tokens.is_valid() => {
                warn!(error = %e, "Refresh failed, using current token until expiry");
                Ok(true)
            }
            Err(AuthError::TokenRefreshFailed(reason)) => {
                warn!(%reason, "Refresh rejected, consent required");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn is_authenticated(&self) -> bool {
        self.tokens
            .read()
            .await
            .as_ref()
            .is_some_and(OAuthTokens::is_valid)
    }

    async fn access_token(&self) -> Result<String> {
        if !self.authenticate().await? {
            return Err(AuthError::NotAuthenticated);
        }
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(AuthError::NotAuthenticated)
    }
}

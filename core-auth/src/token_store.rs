//! Persistent token storage
//!
//! Tokens are serialized to JSON and written under `oauth_tokens:<account>`
//! to an ordered list of [`SecureStore`] backends. Writes land in the first
//! backend that accepts them; reads return the first hit. Typically the
//! relational store comes first and the OS keychain second, so hosts without
//! a keychain still keep their credentials.

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

const KEY_PREFIX: &str = "oauth_tokens";

/// On-disk token format. Expiry is kept as unix seconds.
#[derive(Serialize, Deserialize)]
struct StoredTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_at: i64,
}

struct Backend {
    name: String,
    store: Arc<dyn SecureStore>,
}

/// Token persistence over one or more secure stores.
#[derive(Clone, Default)]
pub struct TokenStore {
    backends: Arc<Vec<Backend>>,
}

impl TokenStore {
    /// Single-backend store.
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self::builder().backend("primary", secure_store).build()
    }

    pub fn builder() -> TokenStoreBuilder {
        TokenStoreBuilder::default()
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    fn storage_key(account: &str) -> String {
        format!("{}:{}", KEY_PREFIX, account)
    }

    /// Persist tokens, replacing any earlier set for the account.
    pub async fn store_tokens(&self, account: &str, tokens: &OAuthTokens) -> Result<()> {
        let stored = StoredTokens {
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
            expires_at: tokens.expires_at.timestamp(),
        };
        let bytes = serde_json::to_vec(&stored)
            .map_err(|e| AuthError::SerializationFailed(e.to_string()))?;
        let key = Self::storage_key(account);

        let mut failures = Vec::new();
        for backend in self.backends.iter() {
            match backend.store.set_secret(&key, &bytes).await {
                Ok(()) => {
                    info!(
                        account,
                        backend = %backend.name,
                        has_refresh_token = stored.refresh_token.is_some(),
                        expires_at = stored.expires_at,
                        "Tokens stored"
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(account, backend = %backend.name, error = %e, "Token write failed, trying next backend");
                    failures.push(format!("{}: {}", backend.name, e));
                }
            }
        }

        Err(AuthError::SecureStorageUnavailable(if failures.is_empty() {
            "no secure store configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    /// Load tokens for an account, `None` when no backend holds any.
    ///
    /// An undecodable entry is removed from its backend and reported as
    /// [`AuthError::TokenCorrupted`].
    pub async fn retrieve_tokens(&self, account: &str) -> Result<Option<OAuthTokens>> {
        let key = Self::storage_key(account);
        let mut failures = Vec::new();

        for backend in self.backends.iter() {
            let bytes = match backend.store.get_secret(&key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(account, backend = %backend.name, error = %e, "Token read failed");
                    failures.push(format!("{}: {}", backend.name, e));
                    continue;
                }
            };

            let stored: StoredTokens = match serde_json::from_slice(&bytes) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(account, backend = %backend.name, "Stored tokens corrupted, removing");
                    let _ = backend.store.delete_secret(&key).await;
                    return Err(AuthError::TokenCorrupted {
                        account: account.to_string(),
                        reason: e.to_string(),
                    });
                }
            };

            debug!(account, backend = %backend.name, "Tokens loaded");
            return Ok(Some(OAuthTokens::from_parts(
                stored.access_token,
                stored.refresh_token,
                stored.expires_at,
            )));
        }

        if !failures.is_empty() && failures.len() == self.backends.len() {
            return Err(AuthError::SecureStorageUnavailable(failures.join("; ")));
        }
        Ok(None)
    }

    /// Erase tokens from every backend. Idempotent.
    pub async fn delete_tokens(&self, account: &str) -> Result<()> {
        let key = Self::storage_key(account);
        let mut failures = Vec::new();

        for backend in self.backends.iter() {
            if let Err(e) = backend.store.delete_secret(&key).await {
                warn!(account, backend = %backend.name, error = %e, "Token delete failed");
                failures.push(format!("{}: {}", backend.name, e));
            }
        }

        if !failures.is_empty() && failures.len() == self.backends.len() {
            return Err(AuthError::SecureStorageUnavailable(failures.join("; ")));
        }
        info!(account, "Tokens deleted");
        Ok(())
    }

    pub async fn has_tokens(&self, account: &str) -> Result<bool> {
        let key = Self::storage_key(account);
        for backend in self.backends.iter() {
            if backend.store.has_secret(&key).await.unwrap_or(false) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Assembles a [`TokenStore`] with backends in priority order.
#[derive(Default)]
pub struct TokenStoreBuilder {
    backends: Vec<Backend>,
}

impl TokenStoreBuilder {
    pub fn backend(mut self, name: impl Into<String>, store: Arc<dyn SecureStore>) -> Self {
        self.backends.push(Backend {
            name: name.into(),
            store,
        });
        self
    }

    pub fn build(self) -> TokenStore {
        TokenStore {
            backends: Arc::new(self.backends),
        }
    }
}

//! Access token seam consumed by remote providers

use crate::error::Result;
use async_trait::async_trait;

/// Supplies bearer tokens to API clients.
///
/// The Drive connector calls [`access_token`](Self::access_token) before
/// every request and never sees refresh tokens or the sign-in flow.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Make sure a usable token is available, refreshing if needed.
    ///
    /// Returns `Ok(false)` when the user has to complete the consent flow.
    async fn authenticate(&self) -> Result<bool>;

    /// A token is held and has not expired.
    async fn is_authenticated(&self) -> bool;

    /// Current access token, refreshed first when close to expiry.
    async fn access_token(&self) -> Result<String>;
}

/// Fixed-token provider for the stub profile and tests.
#[derive(Debug, Clone)]
pub struct StubTokenProvider {
    token: String,
}

impl StubTokenProvider {
    pub fn new() -> Self {
        Self::with_token("stub-drive-access-token")
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Default for StubTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenProvider for StubTokenProvider {
    async fn authenticate(&self) -> Result<bool> {
        Ok(true)
    }

    async fn is_authenticated(&self) -> bool {
        true
    }

    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_provider_is_always_signed_in() {
        let provider = StubTokenProvider::with_token("t");
        assert!(provider.authenticate().await.unwrap());
        assert!(provider.is_authenticated().await);
        assert_eq!(provider.access_token().await.unwrap(), "t");
    }
}

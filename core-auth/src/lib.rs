//! # Authentication
//!
//! OAuth 2.0 credentials for the remote file provider.
//!
//! - Authorization code flow with PKCE ([`oauth`])
//! - Token persistence over prioritized secure stores ([`TokenStore`])
//! - Session management with refresh before expiry ([`AuthManager`])
//! - The [`AccessTokenProvider`] seam the Drive connector depends on

pub mod error;
pub mod manager;
pub mod oauth;
pub mod provider;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier, DRIVE_FILE_SCOPE};
pub use provider::{AccessTokenProvider, StubTokenProvider};
pub use token_store::{TokenStore, TokenStoreBuilder};
pub use types::{AuthState, OAuthTokens};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tokens are treated as expired this long before their real expiry so a
/// request never leaves with a token that dies in flight.
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// OAuth 2.0 token set for the Drive account.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug`
/// implementation redacts them.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("ya29.a0".to_string(), Some("1//0g".to_string()), 3600);
/// assert!(!tokens.is_expired());
/// assert!(tokens.is_valid());
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokens {
    pub access_token: String,
    /// Google only returns a refresh token on the first consent.
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    /// Build a token set expiring `expires_in` seconds from now.
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        }
    }

    /// Rebuild a token set from persisted parts.
    pub fn from_parts(
        access_token: String,
        refresh_token: Option<String>,
        expires_at_unix: i64,
    ) -> Self {
        let expires_at = DateTime::from_timestamp(expires_at_unix, 0).unwrap_or_else(Utc::now);
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Expired, or expiring within [`REFRESH_BUFFER_SECS`].
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(REFRESH_BUFFER_SECS)
    }

    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(buffer_seconds)
    }

    /// The access token can still be presented to the API right now.
    pub fn is_valid(&self) -> bool {
        !self.is_expired_with_buffer(0)
    }

    /// Time remaining until expiry, `None` once expired.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let now = Utc::now();
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authentication state of the Drive account.
///
/// ```text
/// SignedOut -> SigningIn -> SignedIn
///                             ^  |
///                             |  v
///                      TokenRefreshing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AuthState {
    #[default]
    SignedOut,
    SigningIn,
    SignedIn,
    TokenRefreshing,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn | AuthState::TokenRefreshing)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, AuthState::SigningIn | AuthState::TokenRefreshing)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::SignedOut => write!(f, "Signed Out"),
            AuthState::SigningIn => write!(f, "Signing In..."),
            AuthState::SignedIn => write!(f, "Signed In"),
            AuthState::TokenRefreshing => write!(f, "Refreshing Token..."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_buffer() {
        let tokens = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::seconds(120),
        };

        // Inside the refresh window but still usable.
        assert!(tokens.is_expired());
        assert!(tokens.is_valid());
        assert!(tokens.time_until_expiry().is_some());
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let tokens = OAuthTokens {
            access_token: "a".to_string(),
            refresh_token: Some("r".to_string()),
            expires_at: Utc::now() - Duration::seconds(1),
        };
        assert!(!tokens.is_valid());
        assert!(tokens.time_until_expiry().is_none());
    }

    #[test]
    fn test_from_parts_round_trips_timestamp() {
        let tokens = OAuthTokens::from_parts("a".into(), None, 1_700_000_000);
        assert_eq!(tokens.expires_at.timestamp(), 1_700_000_000);
        assert_eq!(tokens.refresh_token(), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = OAuthTokens::new("secret-access".into(), Some("secret-refresh".into()), 60);
        let debug = format!("{:?}", tokens);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_auth_state_flags() {
        assert!(!AuthState::SignedOut.is_authenticated());
        assert!(AuthState::SignedIn.is_authenticated());
        assert!(AuthState::TokenRefreshing.is_in_progress());
        assert_eq!(AuthState::default(), AuthState::SignedOut);
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Authentication failed for {account}: {reason}")]
    AuthenticationFailed { account: String, reason: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No refresh token available for {account}")]
    NoRefreshToken { account: String },

    #[error("No sign-in in progress for {account}")]
    NoSignInInProgress { account: String },

    #[error("OAuth state mismatch: expected {expected}, got {actual}")]
    StateMismatch { expected: String, actual: String },

    #[error("Invalid authorization code: {0}")]
    InvalidAuthCode(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Token serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Stored tokens for {account} are corrupted: {reason}")]
    TokenCorrupted { account: String, reason: String },

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;

//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// No usable access token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limiting outlasted the retry budget
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The resumable upload session misbehaved
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<core_auth::AuthError> for GoogleDriveError {
    fn from(error: core_auth::AuthError) -> Self {
        GoogleDriveError::AuthenticationFailed(error.to_string())
    }
}

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::AuthenticationFailed(msg) => BridgeError::NotAuthenticated(msg),
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            GoogleDriveError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 403,
            message: "insufficientPermissions".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 403): insufficientPermissions"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge: BridgeError =
            GoogleDriveError::AuthenticationFailed("Token expired".to_string()).into();
        assert!(matches!(bridge, BridgeError::NotAuthenticated(_)));

        let bridge: BridgeError = GoogleDriveError::FileNotFound {
            file_id: "abc".to_string(),
        }
        .into();
        assert!(matches!(bridge, BridgeError::NotFound(id) if id == "abc"));

        let bridge: BridgeError = GoogleDriveError::RateLimitExceeded { attempts: 3 }.into();
        assert!(matches!(bridge, BridgeError::OperationFailed(_)));
    }
}

//! Error types for the Supabase Storage provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Object not found: {path}")]
    ObjectNotFound { path: String },

    /// Uploads never overwrite.
    #[error("Object already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for BridgeError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::ObjectNotFound { path } => BridgeError::NotFound(path),
            StorageError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let bridge: BridgeError = StorageError::ObjectNotFound {
            path: "banner/1-a.png".to_string(),
        }
        .into();
        assert!(matches!(bridge, BridgeError::NotFound(p) if p == "banner/1-a.png"));

        let bridge: BridgeError = StorageError::AlreadyExists {
            path: "banner/1-a.png".to_string(),
        }
        .into();
        assert!(
            matches!(bridge, BridgeError::OperationFailed(msg) if msg.contains("already exists"))
        );
    }
}

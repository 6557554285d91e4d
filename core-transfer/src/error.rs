use bridge_traits::error::BridgeError;
use core_media::MediaError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Remote file provider is not authenticated")]
    NotAuthenticated,

    #[error("Remote file provider error: {0}")]
    Remote(#[source] BridgeError),

    #[error("Object storage error: {0}")]
    Storage(#[source] BridgeError),

    #[error("Catalog error: {0}")]
    Media(#[from] MediaError),

    #[error("Insufficient storage space: {required_bytes} bytes required, {available_bytes} available")]
    InsufficientSpace {
        required_bytes: u64,
        available_bytes: u64,
    },

    #[error("No media record references remote file {file_id}")]
    NoMatchingRecord { file_id: String },

    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },
}

impl TransferError {
    pub(crate) fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        TransferError::NotFound {
            entity_type,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;

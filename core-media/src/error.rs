use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Corrupted row in {table}: {message}")]
    CorruptedRow { table: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl MediaError {
    pub(crate) fn not_found(entity_type: &str, id: impl Into<String>) -> Self {
        MediaError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.into(),
        }
    }

    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        MediaError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Catalog error: {0}")]
    Media(#[from] core_media::MediaError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] core_transfer::TransferError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

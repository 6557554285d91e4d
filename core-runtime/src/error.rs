use thiserror::Error;

/// Failures while configuring the runtime or installing logging.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Logging already initialized or failed to install: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;

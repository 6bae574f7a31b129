use thiserror::Error;

/// Errors raised while turning values into wire text and back.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Core error types for tiercache value handling.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Value conversion error: {0}")]
    Conversion(String),

    #[error("Invalid TTL window: {0}")]
    InvalidTtl(String),
}

impl CoreError {
    /// Create a new Conversion error
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion(message.into())
    }

    /// Create a new InvalidTtl error
    pub fn invalid_ttl(message: impl Into<String>) -> Self {
        Self::InvalidTtl(message.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(CodecError::Json(err))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

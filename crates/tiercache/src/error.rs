//! Engine error type.

use std::fmt;

use tiercache_core::{CodecError, CoreError};
use tiercache_storage::StoreError;

/// Boxed error returned by caller-supplied loaders and size resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Type alias for engine results.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by cache, mutex and semaphore operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The remote store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Core(CoreError),

    /// The retry budget ran out while the lock was held by someone else.
    #[error("Lock {key} could not be acquired")]
    LockNotAcquired { key: String },

    /// Patch target is absent or holds null/undefined.
    #[error("Key {key} does not exist")]
    KeyNotFound { key: String },

    /// Patch target holds something other than an object.
    #[error("Key {key} does not hold an object")]
    NotAnObject { key: String },

    #[error("Semaphore {key} doesn't exist.")]
    SemaphoreNotFound { key: String },

    #[error("Semaphore {key} doesn't have any available slots.")]
    NoAvailableSlots { key: String },

    #[error("Index {index} for semaphore {key} is invalid.")]
    InvalidIndex { key: String, index: usize },

    #[error("Cannot shrink pool, size is {current} and you requested a size of {requested}.")]
    CannotShrink { current: usize, requested: usize },

    /// A caller-supplied loader or size resolver failed.
    #[error("Loader failed: {0}")]
    Loader(#[source] BoxError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    pub fn lock_not_acquired(key: impl Into<String>) -> Self {
        Self::LockNotAcquired { key: key.into() }
    }

    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    pub fn semaphore_not_found(key: impl Into<String>) -> Self {
        Self::SemaphoreNotFound { key: key.into() }
    }

    pub fn no_available_slots(key: impl Into<String>) -> Self {
        Self::NoAvailableSlots { key: key.into() }
    }

    pub fn invalid_index(key: impl Into<String>, index: usize) -> Self {
        Self::InvalidIndex {
            key: key.into(),
            index,
        }
    }

    pub fn loader(err: impl Into<BoxError>) -> Self {
        Self::Loader(err.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(_) => ErrorKind::Transport,
            Self::Codec(_) => ErrorKind::Serialization,
            Self::Core(CoreError::InvalidTtl(_)) => ErrorKind::Configuration,
            Self::Core(_) => ErrorKind::Serialization,
            Self::LockNotAcquired { .. } => ErrorKind::LockNotAcquired,
            Self::KeyNotFound { .. }
            | Self::NotAnObject { .. }
            | Self::SemaphoreNotFound { .. }
            | Self::NoAvailableSlots { .. }
            | Self::InvalidIndex { .. }
            | Self::CannotShrink { .. } => ErrorKind::Logical,
            Self::Loader(_) => ErrorKind::Loader,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_lock_not_acquired(&self) -> bool {
        matches!(self, Self::LockNotAcquired { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    pub fn is_logical(&self) -> bool {
        self.kind() == ErrorKind::Logical
    }
}

impl From<CoreError> for CacheError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Codec(codec) => Self::Codec(codec),
            other => Self::Core(other),
        }
    }
}

/// Broad classification of [`CacheError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Remote store unreachable or failing.
    Transport,
    /// Contract violation such as a missing semaphore or an invalid index.
    Logical,
    LockNotAcquired,
    Loader,
    Serialization,
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Logical => write!(f, "logical"),
            Self::LockNotAcquired => write!(f, "lock_not_acquired"),
            Self::Loader => write!(f, "loader"),
            Self::Serialization => write!(f, "serialization"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semaphore_error_texts() {
        assert_eq!(
            CacheError::semaphore_not_found("jobs").to_string(),
            "Semaphore jobs doesn't exist."
        );
        assert_eq!(
            CacheError::no_available_slots("jobs").to_string(),
            "Semaphore jobs doesn't have any available slots."
        );
        assert_eq!(
            CacheError::invalid_index("jobs", 7).to_string(),
            "Index 7 for semaphore jobs is invalid."
        );
        assert_eq!(
            CacheError::CannotShrink {
                current: 4,
                requested: 2
            }
            .to_string(),
            "Cannot shrink pool, size is 4 and you requested a size of 2."
        );
        assert_eq!(
            CacheError::key_not_found("user:1").to_string(),
            "Key user:1 does not exist"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CacheError::from(StoreError::connection("down")).kind(),
            ErrorKind::Transport
        );
        assert!(CacheError::lock_not_acquired("lock:a").is_lock_not_acquired());
        assert!(CacheError::invalid_index("a", 1).is_logical());
        assert_eq!(CacheError::loader("boom").kind(), ErrorKind::Loader);
        assert_eq!(
            CacheError::from(CoreError::invalid_ttl("x")).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(ErrorKind::LockNotAcquired.to_string(), "lock_not_acquired");
    }

    #[test]
    fn test_codec_error_unwraps_from_core() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = CacheError::from(CoreError::from(json_err));
        assert!(matches!(err, CacheError::Codec(_)));
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }
}

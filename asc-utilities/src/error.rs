//! Error types for session and cache stores

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by [`crate::MemoryCache`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned during {0}")]
    LockPoisoned(&'static str),
}

/// Errors raised while reading or writing typed session values
#[derive(Error, Debug)]
pub enum SessionError {
    /// The value cannot be represented as JSON
    #[error("Failed to serialize value for key '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stored bytes are not UTF-8 JSON of the requested shape
    #[error("Failed to deserialize value for key '{key}': {source}")]
    Deserialization {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Session backend error: {0}")]
    Backend(#[from] CacheError),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),
}

impl SessionError {
    pub fn is_serialization(&self) -> bool {
        matches!(self, SessionError::Serialization { .. })
    }

    pub fn is_deserialization(&self) -> bool {
        matches!(self, SessionError::Deserialization { .. })
    }
}

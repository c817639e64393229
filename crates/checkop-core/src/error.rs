use thiserror::Error;

/// Core error types for checkop records
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Unknown record kind: {0}")]
    UnknownKind(String),

    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new UnknownKind error
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind(kind.into())
    }

    /// Create a new InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

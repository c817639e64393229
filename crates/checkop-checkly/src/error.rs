use std::time::Duration;

use thiserror::Error;

/// Errors returned by the external monitoring service or the adapter around it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The external resource does not exist.
    #[error("{resource} {id} not found")]
    NotFound { resource: String, id: String },

    /// The request can never succeed as is: a rejected payload or a
    /// definition that could not be mapped.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network failure, throttling or a server-side error.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::InvalidConfig(_))
    }

    /// Returns `true` if the same call may succeed on a later attempt.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::not_found("check", "abc");
        assert_eq!(err.to_string(), "check abc not found");

        let err = ApiError::Timeout {
            operation: "create_check",
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "create_check timed out after 5000ms");
    }

    #[test]
    fn test_error_predicates() {
        assert!(ApiError::transient("502").is_retriable());
        assert!(!ApiError::validation("bad body").is_retriable());
        assert!(ApiError::validation("bad body").is_validation());
        assert!(ApiError::not_found("group", "1").is_not_found());
        assert!(!ApiError::Cancelled { operation: "x" }.is_retriable());
    }
}

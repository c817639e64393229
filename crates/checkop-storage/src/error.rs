//! Storage error types for the record storage abstraction layer.

use std::fmt;

use checkop_core::CoreError;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested record was not found.
    #[error("Record not found: {kind}/{name}")]
    NotFound {
        /// The kind of record that was not found.
        kind: String,
        /// The name (with namespace, if any) of the missing record.
        name: String,
    },

    /// The caller's resource version is stale.
    #[error("Version conflict: expected {expected}, found {actual}")]
    VersionConflict {
        /// The version the caller based its write on.
        expected: String,
        /// The version currently stored.
        actual: String,
    },

    /// Attempted to create a record that already exists.
    #[error("Record already exists: {kind}/{name}")]
    AlreadyExists {
        /// The kind of record that already exists.
        kind: String,
        /// The name (with namespace, if any) of the existing record.
        name: String,
    },

    /// The record document is malformed.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::VersionConflict {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns `true` if retrying the same operation later can succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::VersionConflict { .. } | Self::Internal { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::VersionConflict { .. } => ErrorCategory::Conflict,
            Self::AlreadyExists { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_record(err.to_string())
    }
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        Self::invalid_record(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Conflict (version or existence).
    Conflict,
    /// Validation error.
    Validation,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("ApiCheck", "web/home");
        assert_eq!(err.to_string(), "Record not found: ApiCheck/web/home");

        let err = StorageError::version_conflict("1", "2");
        assert_eq!(err.to_string(), "Version conflict: expected 1, found 2");

        let err = StorageError::already_exists("Group", "ops");
        assert_eq!(err.to_string(), "Record already exists: Group/ops");
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("ApiCheck", "home");
        assert!(err.is_not_found());
        assert!(!err.is_version_conflict());
        assert!(!err.is_transient());

        let err = StorageError::version_conflict("1", "2");
        assert!(err.is_version_conflict());
        assert!(err.is_transient());

        assert!(!StorageError::invalid_record("bad").is_transient());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("ApiCheck", "home").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("Group", "ops").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::invalid_record("bad data").category(),
            ErrorCategory::Validation
        );
    }
}

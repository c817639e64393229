use checkop_checkly::ApiError;
use checkop_core::RecordKey;
use checkop_storage::{ErrorCategory, StorageError};
use thiserror::Error;

/// Why a reconciliation pass failed.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The declared record can not be synced until it changes.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("External API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Reconciliation cancelled")]
    Cancelled,
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(_) => true,
            Self::Api(err) => err.is_validation(),
            Self::Storage(err) => err.category() == ErrorCategory::Validation,
            Self::Cancelled => false,
        }
    }

    /// Returns `true` if rerunning the same pass may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api(err) => err.is_retriable(),
            Self::Storage(err) => err.is_transient(),
            Self::Validation(_) | Self::Cancelled => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Api(ApiError::Cancelled { .. }))
    }

    /// The event reason attached to the record when a pass fails.
    pub fn reason(&self) -> &'static str {
        if self.is_validation() {
            return "ValidationFailed";
        }
        match self {
            Self::Api(_) => "SyncFailed",
            Self::Storage(_) => "StorageFailed",
            Self::Validation(_) => "ValidationFailed",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// The result of a successful pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the record changes.
    Done,
    /// A dependency exists but has no external identifier yet.
    NotReady { dependency: RecordKey },
}

pub type ReconcileResult = Result<ReconcileOutcome, ReconcileError>;

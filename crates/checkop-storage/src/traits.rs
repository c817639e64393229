//! Storage traits for the record storage abstraction layer.

use async_trait::async_trait;
use checkop_core::RecordKind;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{LabelSelector, StoredRecord};

/// The narrow storage contract the controller depends on.
///
/// Records are JSON documents shaped `{kind, metadata, spec, status}`.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use checkop_storage::{RecordStore, StorageError, StoredRecord};
///
/// async fn get_group(store: &dyn RecordStore, name: &str) -> Result<StoredRecord, StorageError> {
///     store
///         .get(RecordKind::Group, None, name)
///         .await?
///         .ok_or_else(|| StorageError::not_found("Group", name))
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Reads a record by kind, namespace and name.
    ///
    /// Returns `None` if the record does not exist.
    async fn get(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Lists records of a kind, optionally restricted to a namespace and
    /// filtered by labels. Results are ordered by namespace and name.
    async fn list(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredRecord>, StorageError>;

    /// Creates a new record, assigning `uid` and `resourceVersion`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a record with the same key exists.
    /// Returns `StorageError::InvalidRecord` if the document is malformed.
    async fn create(&self, record: &Value) -> Result<StoredRecord, StorageError>;

    /// Updates metadata and spec of an existing record.
    ///
    /// `status` and `metadata.deletionTimestamp` are kept from the stored
    /// version. Returns `None` when the update removed the last finalizer of a
    /// record being deleted, in which case the record is gone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    /// Returns `StorageError::VersionConflict` if `if_match` is provided and doesn't match.
    async fn update(
        &self,
        record: &Value,
        if_match: Option<&str>,
    ) -> Result<Option<StoredRecord>, StorageError>;

    /// Replaces only the `status` of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    /// Returns `StorageError::VersionConflict` if `if_match` is provided and doesn't match.
    async fn update_status(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
        status: &Value,
        if_match: Option<&str>,
    ) -> Result<StoredRecord, StorageError>;

    /// Requests deletion of a record.
    ///
    /// A record without finalizers is removed immediately. Otherwise its
    /// `deletionTimestamp` is set and it stays until the finalizers are gone.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn delete(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

//! Typed access on top of the document-level [`RecordStore`].

use async_trait::async_trait;
use checkop_core::Record;
use serde_json::Value;

use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::{LabelSelector, StoredRecord};

/// Serializes a typed record into a store document with its `kind`.
pub fn to_document<R: Record>(record: &R) -> Result<Value, StorageError> {
    let mut value = serde_json::to_value(record)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| StorageError::invalid_record("record must serialize to an object"))?;
    object.insert("kind".to_string(), Value::String(R::KIND.to_string()));
    Ok(value)
}

/// Deserializes a stored document into a typed record.
pub fn from_stored<R: Record>(stored: StoredRecord) -> Result<R, StorageError> {
    if stored.key.kind != R::KIND {
        return Err(StorageError::invalid_record(format!(
            "expected {}, found {}",
            R::KIND,
            stored.key.kind
        )));
    }
    Ok(serde_json::from_value(stored.record)?)
}

/// Typed convenience methods, available on every [`RecordStore`].
#[async_trait]
pub trait TypedRecordStore: RecordStore {
    async fn get_record<R: Record>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<R>, StorageError> {
        self.get(R::KIND, namespace, name)
            .await?
            .map(from_stored::<R>)
            .transpose()
    }

    async fn list_records<R: Record>(
        &self,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<R>, StorageError> {
        self.list(R::KIND, namespace, selector)
            .await?
            .into_iter()
            .map(from_stored::<R>)
            .collect()
    }

    async fn create_record<R: Record>(&self, record: &R) -> Result<R, StorageError> {
        let document = to_document(record)?;
        from_stored(self.create(&document).await?)
    }

    /// Writes metadata and spec, guarded by the record's resource version.
    async fn update_record<R: Record>(&self, record: &R) -> Result<Option<R>, StorageError> {
        let document = to_document(record)?;
        let if_match = record.meta().resource_version.as_deref();
        self.update(&document, if_match)
            .await?
            .map(from_stored::<R>)
            .transpose()
    }

    /// Writes the record's status, guarded by its resource version.
    async fn update_record_status<R: Record>(&self, record: &R) -> Result<R, StorageError> {
        let document = to_document(record)?;
        let status = document
            .get("status")
            .ok_or_else(|| StorageError::invalid_record(format!("{} has no status", R::KIND)))?;
        let meta = record.meta();
        let stored = self
            .update_status(
                R::KIND,
                meta.namespace.as_deref(),
                &meta.name,
                status,
                meta.resource_version.as_deref(),
            )
            .await?;
        from_stored(stored)
    }

    async fn delete_record<R: Record>(
        &self,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StorageError> {
        self.delete(R::KIND, namespace, name).await
    }
}

impl<S: RecordStore + ?Sized> TypedRecordStore for S {}

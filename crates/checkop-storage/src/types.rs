//! Storage types for the record storage abstraction layer.

use std::collections::BTreeMap;
use std::fmt;

use checkop_core::{RecordKey, RecordKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// A record document as held by a storage backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: RecordKey,
    /// Store-assigned identity, stable across updates.
    pub uid: String,
    /// Store-assigned version, bumped on every write.
    pub version: String,
    /// The full document including `kind`, `metadata`, `spec` and `status`.
    pub record: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
}

impl StoredRecord {
    /// Returns `true` if a delete has been requested for this record.
    #[must_use]
    pub fn is_deleting(&self) -> bool {
        self.record
            .pointer("/metadata/deletionTimestamp")
            .is_some_and(|ts| !ts.is_null())
    }

    /// The record's finalizers.
    #[must_use]
    pub fn finalizers(&self) -> Vec<&str> {
        self.record
            .pointer("/metadata/finalizers")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Equality-based label filter. An empty selector matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty()
    }

    /// Returns `true` if every selector label is present on the document's
    /// `metadata.labels` with the same value.
    #[must_use]
    pub fn matches_document(&self, record: &Value) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(labels) = record.pointer("/metadata/labels").and_then(Value::as_object) else {
            return false;
        };
        self.match_labels
            .iter()
            .all(|(key, value)| labels.get(key).and_then(Value::as_str) == Some(value.as_str()))
    }
}

/// What happened to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Created,
    Updated,
    StatusUpdated,
    /// A delete was requested and the record is waiting on finalizers.
    Deleting,
    /// The record is gone from storage.
    Deleted,
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::StatusUpdated => "status_updated",
            Self::Deleting => "deleting",
            Self::Deleted => "deleted",
        };
        f.write_str(name)
    }
}

/// A change notification emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: RecordKey,
    pub op: ChangeOp,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(key: RecordKey, op: ChangeOp) -> Self {
        Self { key, op }
    }
}

/// Extracts the record key from a document's `kind` and `metadata`.
///
/// Cluster-scoped kinds never carry a namespace in their key.
pub fn record_key(record: &Value) -> Result<RecordKey, StorageError> {
    let kind: RecordKind = record
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::invalid_record("missing kind"))?
        .parse()?;

    let name = record
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| StorageError::invalid_record("missing metadata.name"))?;

    let namespace = if kind.is_cluster_scoped() {
        None
    } else {
        record
            .pointer("/metadata/namespace")
            .and_then(Value::as_str)
            .filter(|ns| !ns.is_empty())
    };

    Ok(RecordKey::new(kind, namespace, name))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_record_key_from_document() {
        let key = record_key(&json!({
            "kind": "ApiCheck",
            "metadata": {"name": "home", "namespace": "web"}
        }))
        .unwrap();
        assert_eq!(key.to_string(), "ApiCheck/web/home");

        let key = record_key(&json!({
            "kind": "Group",
            "metadata": {"name": "ops", "namespace": "ignored"}
        }))
        .unwrap();
        assert_eq!(key.namespace(), None);

        assert!(record_key(&json!({"metadata": {"name": "x"}})).is_err());
        assert!(record_key(&json!({"kind": "Ingress", "metadata": {"name": "x"}})).is_err());
        assert!(record_key(&json!({"kind": "Group", "metadata": {}})).is_err());
    }

    #[test]
    fn test_label_selector() {
        let selector = LabelSelector::everything().with_label("owner", "web");
        let doc = json!({"metadata": {"labels": {"owner": "web", "tier": "edge"}}});
        assert!(selector.matches_document(&doc));
        assert!(!selector.matches_document(&json!({"metadata": {"labels": {"owner": "api"}}})));
        assert!(!selector.matches_document(&json!({"metadata": {}})));
        assert!(LabelSelector::everything().matches_document(&json!({"metadata": {}})));
    }
}

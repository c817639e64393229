use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use checkop_core::{RecordKey, RecordKind};
use checkop_storage::{LabelSelector, RecordStore, StorageError, StoredRecord, record_key};
use papaya::HashMap as PapayaHashMap;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;

/// In-memory record store using a papaya lock-free HashMap.
///
/// Reads never block. Writes are serialized so that version checks and
/// finalizer bookkeeping are atomic with the write they guard.
#[derive(Debug)]
pub struct InMemoryStore {
    data: PapayaHashMap<RecordKey, StoredRecord>,
    version_counter: AtomicU64,
    write_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            data: PapayaHashMap::new(),
            version_counter: AtomicU64::new(1),
            write_lock: Mutex::new(()),
        }
    }

    fn next_version(&self) -> String {
        self.version_counter
            .fetch_add(1, Ordering::SeqCst)
            .to_string()
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, key: &RecordKey) -> Option<StoredRecord> {
        self.data.pin().get(key).cloned()
    }

    fn store(&self, stored: StoredRecord) {
        self.data.pin().insert(stored.key.clone(), stored);
    }

    fn remove(&self, key: &RecordKey) {
        self.data.pin().remove(key);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn make_key(kind: RecordKind, namespace: Option<&str>, name: &str) -> RecordKey {
    let namespace = if kind.is_cluster_scoped() {
        None
    } else {
        namespace
    };
    RecordKey::new(kind, namespace, name)
}

fn metadata_mut(record: &mut Value) -> Result<&mut Map<String, Value>, StorageError> {
    record
        .get_mut("metadata")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| StorageError::invalid_record("metadata must be an object"))
}

fn check_version(existing: &StoredRecord, if_match: Option<&str>) -> Result<(), StorageError> {
    match if_match {
        Some(expected) if expected != existing.version => {
            Err(StorageError::version_conflict(expected, &existing.version))
        }
        _ => Ok(()),
    }
}

fn has_finalizers(record: &Value) -> bool {
    record
        .pointer("/metadata/finalizers")
        .and_then(Value::as_array)
        .is_some_and(|finalizers| !finalizers.is_empty())
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn get(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        Ok(self.load(&make_key(kind, namespace, name)))
    }

    async fn list(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        let mut records: Vec<StoredRecord> = {
            let guard = self.data.pin();
            guard
                .iter()
                .filter(|(key, _)| key.kind == kind)
                .filter(|(key, _)| namespace.is_none() || key.namespace() == namespace)
                .filter(|(_, stored)| selector.matches_document(&stored.record))
                .map(|(_, stored)| stored.clone())
                .collect()
        };
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }

    async fn create(&self, record: &Value) -> Result<StoredRecord, StorageError> {
        let key = record_key(record)?;
        let _write = self.write_lock.lock().await;

        if self.load(&key).is_some() {
            return Err(StorageError::already_exists(
                key.kind.as_str(),
                key.to_string(),
            ));
        }

        let uid = uuid::Uuid::new_v4().to_string();
        let version = self.next_version();
        let now = OffsetDateTime::now_utc();

        let mut document = record.clone();
        let metadata = metadata_mut(&mut document)?;
        metadata.insert("uid".to_string(), Value::String(uid.clone()));
        metadata.insert("resourceVersion".to_string(), Value::String(version.clone()));
        metadata.remove("deletionTimestamp");
        if key.kind.is_cluster_scoped() {
            metadata.remove("namespace");
        }

        let stored = StoredRecord {
            key,
            uid,
            version,
            record: document,
            created_at: now,
            last_updated: now,
        };
        self.store(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        record: &Value,
        if_match: Option<&str>,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let key = record_key(record)?;
        let _write = self.write_lock.lock().await;

        let existing = self
            .load(&key)
            .ok_or_else(|| StorageError::not_found(key.kind.as_str(), key.to_string()))?;
        check_version(&existing, if_match)?;

        let deleting = existing.is_deleting();
        if deleting && !has_finalizers(record) {
            self.remove(&key);
            return Ok(None);
        }

        let version = self.next_version();
        let mut document = record.clone();
        match existing.record.get("status") {
            Some(status) => {
                if let Some(object) = document.as_object_mut() {
                    object.insert("status".to_string(), status.clone());
                }
            }
            None => {
                if let Some(object) = document.as_object_mut() {
                    object.remove("status");
                }
            }
        }

        let metadata = metadata_mut(&mut document)?;
        metadata.insert("uid".to_string(), Value::String(existing.uid.clone()));
        metadata.insert("resourceVersion".to_string(), Value::String(version.clone()));
        match existing.record.pointer("/metadata/deletionTimestamp") {
            Some(ts) if deleting => {
                metadata.insert("deletionTimestamp".to_string(), ts.clone());
            }
            _ => {
                metadata.remove("deletionTimestamp");
            }
        }
        if key.kind.is_cluster_scoped() {
            metadata.remove("namespace");
        }

        let stored = StoredRecord {
            key,
            uid: existing.uid,
            version,
            record: document,
            created_at: existing.created_at,
            last_updated: OffsetDateTime::now_utc(),
        };
        self.store(stored.clone());
        Ok(Some(stored))
    }

    async fn update_status(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
        status: &Value,
        if_match: Option<&str>,
    ) -> Result<StoredRecord, StorageError> {
        let key = make_key(kind, namespace, name);
        let _write = self.write_lock.lock().await;

        let existing = self
            .load(&key)
            .ok_or_else(|| StorageError::not_found(kind.as_str(), key.to_string()))?;
        check_version(&existing, if_match)?;

        let version = self.next_version();
        let mut document = existing.record.clone();
        if let Some(object) = document.as_object_mut() {
            object.insert("status".to_string(), status.clone());
        }
        metadata_mut(&mut document)?
            .insert("resourceVersion".to_string(), Value::String(version.clone()));

        let stored = StoredRecord {
            version,
            record: document,
            last_updated: OffsetDateTime::now_utc(),
            ..existing
        };
        self.store(stored.clone());
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StorageError> {
        let key = make_key(kind, namespace, name);
        let _write = self.write_lock.lock().await;

        let existing = self
            .load(&key)
            .ok_or_else(|| StorageError::not_found(kind.as_str(), key.to_string()))?;

        if !has_finalizers(&existing.record) {
            self.remove(&key);
            return Ok(());
        }
        if existing.is_deleting() {
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let timestamp = now
            .format(&Rfc3339)
            .map_err(|e| StorageError::internal(e.to_string()))?;
        let version = self.next_version();
        let mut document = existing.record.clone();
        let metadata = metadata_mut(&mut document)?;
        metadata.insert("deletionTimestamp".to_string(), Value::String(timestamp));
        metadata.insert("resourceVersion".to_string(), Value::String(version.clone()));

        self.store(StoredRecord {
            version,
            record: document,
            last_updated: now,
            ..existing
        });
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

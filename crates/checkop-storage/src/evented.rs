//! EventedStore - a store wrapper that emits change events after mutations.
//!
//! The controller's scheduler subscribes to these events to enqueue record
//! keys for reconciliation.
//!
//! # Example
//!
//! ```ignore
//! use checkop_storage::{ChangeBroadcaster, EventedStore};
//!
//! let broadcaster = ChangeBroadcaster::new_shared();
//! let store = EventedStore::new(memory_store, broadcaster.clone());
//! let mut changes = broadcaster.subscribe();
//!
//! store.create(&check_json).await?;
//! let event = changes.recv().await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use checkop_core::{RecordKey, RecordKind};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::RecordStore;
use crate::types::{ChangeEvent, ChangeOp, LabelSelector, StoredRecord, record_key};

/// Default buffer size for the broadcast channel.
/// Slow receivers lag and must fall back to a full resync.
const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Fan-out of record change events.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the number of subscribers that received the event.
    pub fn send(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A store wrapper that emits a [`ChangeEvent`] after each successful mutation.
///
/// Events are emitted **after** the inner operation succeeds, so every event
/// corresponds to a change that is visible to readers.
pub struct EventedStore<S: RecordStore> {
    inner: S,
    broadcaster: Arc<ChangeBroadcaster>,
}

impl<S: RecordStore> EventedStore<S> {
    pub fn new(inner: S, broadcaster: Arc<ChangeBroadcaster>) -> Self {
        Self { inner, broadcaster }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn broadcaster(&self) -> &Arc<ChangeBroadcaster> {
        &self.broadcaster
    }

    fn emit(&self, key: RecordKey, op: ChangeOp) {
        if self.broadcaster.subscriber_count() == 0 {
            return;
        }
        let subscribers = self.broadcaster.send(ChangeEvent::new(key.clone(), op));
        debug!(record = %key, op = %op, subscribers, "Emitted change event");
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for EventedStore<S> {
    async fn get(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        self.inner.get(kind, namespace, name).await
    }

    async fn list(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        selector: &LabelSelector,
    ) -> Result<Vec<StoredRecord>, StorageError> {
        self.inner.list(kind, namespace, selector).await
    }

    async fn create(&self, record: &Value) -> Result<StoredRecord, StorageError> {
        let stored = self.inner.create(record).await?;
        self.emit(stored.key.clone(), ChangeOp::Created);
        Ok(stored)
    }

    async fn update(
        &self,
        record: &Value,
        if_match: Option<&str>,
    ) -> Result<Option<StoredRecord>, StorageError> {
        let key = record_key(record)?;
        let result = self.inner.update(record, if_match).await?;
        let op = if result.is_some() {
            ChangeOp::Updated
        } else {
            ChangeOp::Deleted
        };
        self.emit(key, op);
        Ok(result)
    }

    async fn update_status(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
        status: &Value,
        if_match: Option<&str>,
    ) -> Result<StoredRecord, StorageError> {
        let stored = self
            .inner
            .update_status(kind, namespace, name, status, if_match)
            .await?;
        self.emit(stored.key.clone(), ChangeOp::StatusUpdated);
        Ok(stored)
    }

    async fn delete(
        &self,
        kind: RecordKind,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<(), StorageError> {
        self.inner.delete(kind, namespace, name).await?;
        // The inner store tells us nothing about finalizers, so look again.
        let op = match self.inner.get(kind, namespace, name).await? {
            Some(_) => ChangeOp::Deleting,
            None => ChangeOp::Deleted,
        };
        let namespace = if kind.is_cluster_scoped() { None } else { namespace };
        self.emit(RecordKey::new(kind, namespace, name), op);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}

impl<S: RecordStore> std::fmt::Debug for EventedStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventedStore")
            .field("backend", &self.inner.backend_name())
            .field("subscriber_count", &self.broadcaster.subscriber_count())
            .finish()
    }
}

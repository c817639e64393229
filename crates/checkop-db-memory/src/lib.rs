//! In-memory storage backend for the checkop controller.
//!
//! This crate provides an in-memory implementation of the `RecordStore`
//! trait from `checkop-storage`, using a papaya lock-free HashMap, plus a
//! bounded in-memory [`EventRecorder`](checkop_storage::EventRecorder).
//!
//! # Example
//!
//! ```ignore
//! use checkop_db_memory::InMemoryStore;
//! use checkop_storage::RecordStore;
//!
//! let store = InMemoryStore::new();
//!
//! let group = serde_json::json!({
//!     "kind": "Group",
//!     "metadata": {"name": "ops"},
//!     "spec": {"locations": ["eu-west-1"]}
//! });
//! let created = store.create(&group).await?;
//! ```

mod event_log;
mod store;

pub use checkop_storage::{RecordStore, StorageError, StoredRecord};
pub use event_log::{DEFAULT_EVENTS_PER_RECORD, InMemoryEventLog};
pub use store::InMemoryStore;

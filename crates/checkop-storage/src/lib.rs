//! # checkop-storage
//!
//! Storage abstraction layer for the checkop controller.
//!
//! This crate defines the narrow contract the controller needs from the
//! declarative record substrate. It contains no backends; those live in
//! separate crates.
//!
//! ## Overview
//!
//! - [`RecordStore`]: get, list (with label selectors), create, update,
//!   status-only update and finalizer-aware delete of JSON record documents
//! - [`TypedRecordStore`]: the same operations over [`checkop_core::Record`] types
//! - [`EventedStore`] and [`ChangeBroadcaster`]: the watch stream
//! - [`EventRecorder`]: the recent-events stream attached to each record

mod error;
pub mod events;
pub mod evented;
mod traits;
mod typed;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use evented::{ChangeBroadcaster, EventedStore};
pub use events::{EventRecorder, EventType, RecordEvent};
pub use traits::RecordStore;
pub use typed::{TypedRecordStore, from_stored, to_document};
pub use types::{ChangeEvent, ChangeOp, LabelSelector, StoredRecord, record_key};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared store trait object.
pub type DynStore = std::sync::Arc<dyn RecordStore>;

/// Type alias for a shared event recorder.
pub type DynEventRecorder = std::sync::Arc<dyn EventRecorder>;

//! Finalizer-guarded lifecycle shared by every externally synced kind.
//!
//! A record moves through four states:
//!
//! - **Unmanaged**: no finalizer. The finalizer is attached and persisted,
//!   and the pass stops without any external call.
//! - **Active**: finalizer present. The handler creates the external
//!   resource when the record has no external id, and updates it otherwise.
//!   A newly assigned id is written to the record's status.
//! - **Terminating**: a delete was requested. The handler deletes the
//!   external resource; only after that succeeds is the finalizer removed.
//! - **Gone**: the store drops the record once its last finalizer is removed.

use async_trait::async_trait;
use checkop_core::{ControllerDomain, Record, RecordKey};
use checkop_storage::{
    DynEventRecorder, DynStore, RecordEvent, StorageError, TypedRecordStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ReconcileError, ReconcileOutcome, ReconcileResult};

/// What an apply step did.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied<R> {
    /// The external resource matches the record. Carries the record when
    /// its status changed and has to be persisted.
    Synced(Option<R>),
    /// A dependency has no external id yet. No external call was made.
    NotReady(RecordKey),
}

/// The kind-specific half of the lifecycle.
#[async_trait]
pub trait LifecycleHandler<R: Record>: Send + Sync {
    /// Whether the record has been created externally.
    fn has_external(&self, record: &R) -> bool;

    /// Creates or updates the external resource.
    async fn apply(
        &self,
        record: &R,
        cancel: &CancellationToken,
    ) -> Result<Applied<R>, ReconcileError>;

    /// Deletes the external resource. Only called when
    /// [`has_external`](Self::has_external) is true.
    async fn cleanup(&self, record: &R, cancel: &CancellationToken) -> Result<(), ReconcileError>;
}

/// Drives one record through the lifecycle for a given handler.
#[derive(Clone)]
pub struct FinalizerLifecycle {
    store: DynStore,
    events: DynEventRecorder,
    finalizer: String,
}

impl FinalizerLifecycle {
    pub fn new(store: DynStore, events: DynEventRecorder, domain: &ControllerDomain) -> Self {
        Self {
            store,
            events,
            finalizer: domain.finalizer(),
        }
    }

    pub fn finalizer(&self) -> &str {
        &self.finalizer
    }

    pub async fn reconcile<R, H>(
        &self,
        handler: &H,
        namespace: Option<&str>,
        name: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult
    where
        R: Record,
        H: LifecycleHandler<R> + ?Sized,
    {
        let Some(mut record) = self.store.get_record::<R>(namespace, name).await? else {
            debug!(kind = %R::KIND, name, "Record gone, nothing to reconcile");
            return Ok(ReconcileOutcome::Done);
        };
        let key = record.key();

        if record.meta().is_deleting() {
            if !record.meta().has_finalizer(&self.finalizer) {
                return Ok(ReconcileOutcome::Done);
            }

            if handler.has_external(&record) {
                handler.cleanup(&record, cancel).await?;
            } else {
                debug!(record = %key, "Never created externally, skipping external delete");
            }

            record.meta_mut().remove_finalizer(&self.finalizer);
            ignore_missing(self.store.update_record(&record).await)?;
            info!(record = %key, "Removed finalizer");
            self.events.record(RecordEvent::normal(
                key,
                "Deleted",
                "external resource deleted, finalizer removed",
            ));
            return Ok(ReconcileOutcome::Done);
        }

        if record.meta_mut().add_finalizer(&self.finalizer) {
            ignore_missing(self.store.update_record(&record).await)?;
            info!(record = %key, finalizer = %self.finalizer, "Added finalizer");
            self.events.record(RecordEvent::normal(
                key,
                "FinalizerAdded",
                format!("finalizer {} attached", self.finalizer),
            ));
            return Ok(ReconcileOutcome::Done);
        }

        let was_external = handler.has_external(&record);
        match handler.apply(&record, cancel).await? {
            Applied::Synced(None) => {
                debug!(record = %key, "External resource in sync");
                Ok(ReconcileOutcome::Done)
            }
            Applied::Synced(Some(mut updated)) => {
                // Status has a single writer; a concurrent spec edit must not
                // discard a freshly assigned external id.
                updated.meta_mut().resource_version = None;
                self.store.update_record_status(&updated).await?;
                if !was_external {
                    self.events.record(RecordEvent::normal(
                        key,
                        "Created",
                        "external resource created",
                    ));
                }
                Ok(ReconcileOutcome::Done)
            }
            Applied::NotReady(dependency) => {
                debug!(record = %key, dependency = %dependency, "Dependency not ready");
                Ok(ReconcileOutcome::NotReady { dependency })
            }
        }
    }
}

impl std::fmt::Debug for FinalizerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizerLifecycle")
            .field("backend", &self.store.backend_name())
            .field("finalizer", &self.finalizer)
            .finish_non_exhaustive()
    }
}

/// Treats a record vanishing between read and write as nothing left to do.
pub(crate) fn ignore_missing<T>(result: Result<T, StorageError>) -> Result<Option<T>, StorageError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

use async_trait::async_trait;
use checkop_checkly::{CheckDefinition, SyncAdapter};
use checkop_core::{CheckStatus, ControllerDomain, ManagedCheck};
use checkop_storage::{DynEventRecorder, DynStore};
use tokio_util::sync::CancellationToken;

use crate::dependency::{Resolution, resolve_group};
use crate::error::{ReconcileError, ReconcileResult};
use crate::lifecycle::{Applied, FinalizerLifecycle, LifecycleHandler};

/// Keeps one external check per [`ManagedCheck`].
///
/// A check is only created or updated once its group has an external id.
#[derive(Clone)]
pub struct CheckReconciler {
    store: DynStore,
    adapter: SyncAdapter,
    lifecycle: FinalizerLifecycle,
}

impl CheckReconciler {
    pub fn new(
        store: DynStore,
        events: DynEventRecorder,
        adapter: SyncAdapter,
        domain: &ControllerDomain,
    ) -> Self {
        let lifecycle = FinalizerLifecycle::new(store.clone(), events, domain);
        Self {
            store,
            adapter,
            lifecycle,
        }
    }

    pub async fn reconcile(
        &self,
        namespace: Option<&str>,
        name: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult {
        self.lifecycle
            .reconcile::<ManagedCheck, _>(self, namespace, name, cancel)
            .await
    }
}

/// Builds the adapter definition for a check whose group resolved to `group_id`.
pub fn check_definition(check: &ManagedCheck, group_id: i64) -> CheckDefinition {
    let spec = &check.spec;
    CheckDefinition {
        name: check.metadata.name.clone(),
        namespace: check.metadata.namespace.clone(),
        endpoint: spec.endpoint.clone(),
        frequency: spec.frequency,
        max_response_time: spec.max_response_time,
        muted: spec.muted,
        success: spec.success.clone(),
        method: spec.method.clone(),
        assertions: spec.assertions.clone(),
        body: spec.body.clone(),
        body_type: spec.body_type.clone(),
        group_id,
        labels: check.metadata.labels.clone(),
    }
}

#[async_trait]
impl LifecycleHandler<ManagedCheck> for CheckReconciler {
    fn has_external(&self, check: &ManagedCheck) -> bool {
        check.status.external_id().is_some()
    }

    async fn apply(
        &self,
        check: &ManagedCheck,
        cancel: &CancellationToken,
    ) -> Result<Applied<ManagedCheck>, ReconcileError> {
        let group_id = match resolve_group(self.store.as_ref(), &check.spec.group).await? {
            Resolution::Ready(id) => id,
            Resolution::NotReady(group) => return Ok(Applied::NotReady(group)),
        };
        let definition = check_definition(check, group_id);

        let id = match check.status.external_id() {
            Some(id) => {
                self.adapter.update_check(id, &definition, cancel).await?;
                if check.status.group_id == group_id {
                    return Ok(Applied::Synced(None));
                }
                id.to_string()
            }
            None => self.adapter.create_check(&definition, cancel).await?,
        };

        let mut synced = check.clone();
        synced.status = CheckStatus { id, group_id };
        Ok(Applied::Synced(Some(synced)))
    }

    async fn cleanup(
        &self,
        check: &ManagedCheck,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        if let Some(id) = check.status.external_id() {
            self.adapter.delete_check(id, cancel).await?;
        }
        Ok(())
    }
}

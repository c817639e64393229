use async_trait::async_trait;
use checkop_checkly::{GroupDefinition, SyncAdapter};
use checkop_core::{CheckGroup, ControllerDomain, GroupStatus};
use checkop_storage::{DynEventRecorder, DynStore};
use tokio_util::sync::CancellationToken;

use crate::dependency::{Resolution, resolve_alert_channels};
use crate::error::{ReconcileError, ReconcileResult};
use crate::lifecycle::{Applied, FinalizerLifecycle, LifecycleHandler};

/// Keeps one external check group per [`CheckGroup`], subscribed to the
/// external ids of its alert channels.
#[derive(Clone)]
pub struct GroupReconciler {
    store: DynStore,
    adapter: SyncAdapter,
    lifecycle: FinalizerLifecycle,
}

impl GroupReconciler {
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

    pub async fn reconcile(&self, name: &str, cancel: &CancellationToken) -> ReconcileResult {
        self.lifecycle
            .reconcile::<CheckGroup, _>(self, None, name, cancel)
            .await
    }
}

#[async_trait]
impl LifecycleHandler<CheckGroup> for GroupReconciler {
    fn has_external(&self, group: &CheckGroup) -> bool {
        group.status.id != 0
    }

    async fn apply(
        &self,
        group: &CheckGroup,
        cancel: &CancellationToken,
    ) -> Result<Applied<CheckGroup>, ReconcileError> {
        let alert_channels =
            match resolve_alert_channels(self.store.as_ref(), &group.spec.alert_channels).await? {
                Resolution::Ready(subscriptions) => subscriptions,
                Resolution::NotReady(channel) => return Ok(Applied::NotReady(channel)),
            };

        let definition = GroupDefinition {
            name: group.metadata.name.clone(),
            activated: group.spec.activated,
            locations: group.spec.locations.clone(),
            private_locations: group.spec.private_locations.clone(),
            alert_channels,
            labels: group.metadata.labels.clone(),
        };

        if group.status.id != 0 {
            self.adapter
                .update_group(group.status.id, &definition, cancel)
                .await?;
            return Ok(Applied::Synced(None));
        }

        let id = self.adapter.create_group(&definition, cancel).await?;
        let mut synced = group.clone();
        synced.status = GroupStatus { id };
        Ok(Applied::Synced(Some(synced)))
    }

    async fn cleanup(
        &self,
        group: &CheckGroup,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.adapter.delete_group(group.status.id, cancel).await?;
        Ok(())
    }
}

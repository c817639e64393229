use async_trait::async_trait;
use checkop_checkly::{AlertChannelDefinition, OpsGenieTarget, SyncAdapter, WebhookTarget};
use checkop_core::{AlertChannel, AlertChannelStatus, ControllerDomain};
use checkop_storage::{DynEventRecorder, DynStore, RecordStore};
use tokio_util::sync::CancellationToken;

use crate::dependency::resolve_secret;
use crate::error::{ReconcileError, ReconcileResult};
use crate::lifecycle::{Applied, FinalizerLifecycle, LifecycleHandler};

/// Keeps one external alert channel per [`AlertChannel`].
///
/// Credentials referenced by the channel are read from secrets on every
/// pass, so rotating a secret is picked up by the next update.
#[derive(Clone)]
pub struct AlertChannelReconciler {
    store: DynStore,
    adapter: SyncAdapter,
    lifecycle: FinalizerLifecycle,
}

impl AlertChannelReconciler {
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
            .reconcile::<AlertChannel, _>(self, None, name, cancel)
            .await
    }
}

/// Resolves the channel's secrets into an adapter definition.
pub async fn alert_channel_definition(
    store: &dyn RecordStore,
    channel: &AlertChannel,
) -> Result<AlertChannelDefinition, ReconcileError> {
    let spec = &channel.spec;

    let opsgenie = match &spec.opsgenie {
        Some(opsgenie) => Some(OpsGenieTarget {
            api_key: resolve_secret(store, &opsgenie.api_secret).await?,
            region: opsgenie.region.clone(),
            priority: opsgenie.priority.clone(),
        }),
        None => None,
    };

    let webhook = match &spec.webhook {
        Some(webhook) => {
            let webhook_secret = match &webhook.webhook_secret {
                Some(reference) => Some(resolve_secret(store, reference).await?),
                None => None,
            };
            Some(WebhookTarget {
                name: webhook.name.clone(),
                url: webhook.url.clone(),
                webhook_type: webhook.webhook_type.clone(),
                method: webhook.method.clone(),
                template: webhook.template.clone(),
                webhook_secret,
                headers: webhook.headers.clone(),
                query_parameters: webhook.query_parameters.clone(),
            })
        }
        None => None,
    };

    Ok(AlertChannelDefinition {
        name: channel.metadata.name.clone(),
        send_recovery: spec.send_recovery,
        send_failure: spec.send_failure,
        send_degraded: spec.send_degraded,
        ssl_expiry: spec.ssl_expiry,
        ssl_expiry_threshold: spec.ssl_expiry_threshold,
        opsgenie,
        email: spec.email.as_ref().map(|email| email.address.clone()),
        webhook,
    })
}

#[async_trait]
impl LifecycleHandler<AlertChannel> for AlertChannelReconciler {
    fn has_external(&self, channel: &AlertChannel) -> bool {
        channel.status.id != 0
    }

    async fn apply(
        &self,
        channel: &AlertChannel,
        cancel: &CancellationToken,
    ) -> Result<Applied<AlertChannel>, ReconcileError> {
        let definition = alert_channel_definition(self.store.as_ref(), channel).await?;

        if channel.status.id != 0 {
            self.adapter
                .update_alert_channel(channel.status.id, &definition, cancel)
                .await?;
            return Ok(Applied::Synced(None));
        }

        let id = self.adapter.create_alert_channel(&definition, cancel).await?;
        let mut synced = channel.clone();
        synced.status = AlertChannelStatus { id };
        Ok(Applied::Synced(Some(synced)))
    }

    async fn cleanup(
        &self,
        channel: &AlertChannel,
        cancel: &CancellationToken,
    ) -> Result<(), ReconcileError> {
        self.adapter
            .delete_alert_channel(channel.status.id, cancel)
            .await?;
        Ok(())
    }
}

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::MonitoringApi;
use crate::error::ApiError;
use crate::mapping::{
    AlertChannelDefinition, CheckDefinition, GroupDefinition, alert_channel_payload,
    check_payload, group_payload,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Validates and maps definitions, then calls the external service.
///
/// Every call is bounded by a fixed timeout and the caller's cancellation
/// token. Mapping failures surface before any call is made. Deleting a
/// resource that is already gone succeeds.
#[derive(Clone)]
pub struct SyncAdapter {
    api: Arc<dyn MonitoringApi>,
    timeout: Duration,
}

impl SyncAdapter {
    pub fn new(api: Arc<dyn MonitoringApi>) -> Self {
        Self::with_timeout(api, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api: Arc<dyn MonitoringApi>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ApiError>>,
    ) -> Result<T, ApiError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled { operation }),
            result = tokio::time::timeout(self.timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(ApiError::Timeout { operation, after: self.timeout }),
            },
        }
    }

    pub async fn create_check(
        &self,
        check: &CheckDefinition,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        let payload = check_payload(check)?;
        let id = self
            .bounded("create_check", cancel, self.api.create_check(&payload))
            .await?;
        info!(check = %check.name, id = %id, "Created external check");
        Ok(id)
    }

    pub async fn update_check(
        &self,
        id: &str,
        check: &CheckDefinition,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let payload = check_payload(check)?;
        self.bounded("update_check", cancel, self.api.update_check(id, &payload))
            .await?;
        debug!(check = %check.name, id = %id, "Updated external check");
        Ok(())
    }

    pub async fn delete_check(&self, id: &str, cancel: &CancellationToken) -> Result<(), ApiError> {
        let result = self
            .bounded("delete_check", cancel, self.api.delete_check(id))
            .await;
        tolerate_missing(result, "check", id)
    }

    pub async fn create_group(
        &self,
        group: &GroupDefinition,
        cancel: &CancellationToken,
    ) -> Result<i64, ApiError> {
        let payload = group_payload(group);
        let id = self
            .bounded("create_group", cancel, self.api.create_group(&payload))
            .await?;
        info!(group = %group.name, id, "Created external group");
        Ok(id)
    }

    pub async fn update_group(
        &self,
        id: i64,
        group: &GroupDefinition,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let payload = group_payload(group);
        self.bounded("update_group", cancel, self.api.update_group(id, &payload))
            .await?;
        debug!(group = %group.name, id, "Updated external group");
        Ok(())
    }

    pub async fn delete_group(&self, id: i64, cancel: &CancellationToken) -> Result<(), ApiError> {
        let result = self
            .bounded("delete_group", cancel, self.api.delete_group(id))
            .await;
        tolerate_missing(result, "group", &id.to_string())
    }

    pub async fn create_alert_channel(
        &self,
        channel: &AlertChannelDefinition,
        cancel: &CancellationToken,
    ) -> Result<i64, ApiError> {
        let payload = alert_channel_payload(channel)?;
        let id = self
            .bounded(
                "create_alert_channel",
                cancel,
                self.api.create_alert_channel(&payload),
            )
            .await?;
        info!(
            channel = %channel.name,
            channel_type = payload.config.channel_type(),
            id,
            "Created external alert channel"
        );
        Ok(id)
    }

    pub async fn update_alert_channel(
        &self,
        id: i64,
        channel: &AlertChannelDefinition,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let payload = alert_channel_payload(channel)?;
        self.bounded(
            "update_alert_channel",
            cancel,
            self.api.update_alert_channel(id, &payload),
        )
        .await?;
        debug!(channel = %channel.name, id, "Updated external alert channel");
        Ok(())
    }

    pub async fn delete_alert_channel(
        &self,
        id: i64,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        let result = self
            .bounded(
                "delete_alert_channel",
                cancel,
                self.api.delete_alert_channel(id),
            )
            .await;
        tolerate_missing(result, "alert channel", &id.to_string())
    }
}

impl std::fmt::Debug for SyncAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncAdapter")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn tolerate_missing(result: Result<(), ApiError>, resource: &str, id: &str) -> Result<(), ApiError> {
    match result {
        Err(err) if err.is_not_found() => {
            debug!(resource, id, "External resource already gone");
            Ok(())
        }
        Err(err) => Err(err),
        Ok(()) => {
            info!(resource, id, "Deleted external resource");
            Ok(())
        }
    }
}

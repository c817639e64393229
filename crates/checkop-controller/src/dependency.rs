//! Looks up the external identifiers of referenced records.
//!
//! A missing reference is a validation failure. A reference that exists but
//! has not been synced yet resolves to [`Resolution::NotReady`], which is
//! not an error.

use checkop_checkly::AlertChannelSubscription;
use checkop_core::{AlertChannel, CheckGroup, Record, RecordKey, Secret, SecretKeyRef};
use checkop_storage::{RecordStore, TypedRecordStore};
use tracing::debug;

use crate::error::ReconcileError;

/// Namespace used for secret references that do not name one.
pub const DEFAULT_SECRET_NAMESPACE: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    Ready(T),
    /// The referenced record has no external identifier yet.
    NotReady(RecordKey),
}

impl<T> Resolution<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Resolves a group name to its external id.
pub async fn resolve_group(
    store: &dyn RecordStore,
    name: &str,
) -> Result<Resolution<i64>, ReconcileError> {
    let group = store
        .get_record::<CheckGroup>(None, name)
        .await?
        .ok_or_else(|| ReconcileError::validation(format!("group {name} not found")))?;

    if group.status.id == 0 {
        debug!(group = %name, "Group has no external id yet");
        return Ok(Resolution::NotReady(group.key()));
    }
    Ok(Resolution::Ready(group.status.id))
}

/// Resolves alert channel names to activated subscriptions, in order.
///
/// The first channel without an external id makes the whole set not ready.
pub async fn resolve_alert_channels(
    store: &dyn RecordStore,
    names: &[String],
) -> Result<Resolution<Vec<AlertChannelSubscription>>, ReconcileError> {
    let mut subscriptions = Vec::with_capacity(names.len());
    for name in names {
        let channel = store
            .get_record::<AlertChannel>(None, name)
            .await?
            .ok_or_else(|| ReconcileError::validation(format!("alert channel {name} not found")))?;

        if channel.status.id == 0 {
            debug!(channel = %name, "Alert channel has no external id yet");
            return Ok(Resolution::NotReady(channel.key()));
        }
        subscriptions.push(AlertChannelSubscription {
            alert_channel_id: channel.status.id,
            activated: true,
        });
    }
    Ok(Resolution::Ready(subscriptions))
}

/// Reads one key of a secret. A missing secret, key or empty value fails.
pub async fn resolve_secret(
    store: &dyn RecordStore,
    reference: &SecretKeyRef,
) -> Result<String, ReconcileError> {
    let namespace = reference
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(DEFAULT_SECRET_NAMESPACE);

    let secret = store
        .get_record::<Secret>(Some(namespace), &reference.name)
        .await?
        .ok_or_else(|| {
            ReconcileError::validation(format!("secret {namespace}/{} not found", reference.name))
        })?;

    secret
        .value(&reference.key)
        .map(str::to_string)
        .ok_or_else(|| {
            ReconcileError::validation(format!(
                "secret {namespace}/{} has no value for key {}",
                reference.name, reference.key
            ))
        })
}

use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::meta::ObjectMeta;

/// Points at one key of a [`Secret`](super::Secret).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailChannel {
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpsGenieChannel {
    pub api_secret: SecretKeyRef,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub priority: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookChannel {
    pub name: String,
    pub url: String,
    pub webhook_type: String,
    pub method: String,
    pub template: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<SecretKeyRef>,
    pub headers: Vec<KeyValue>,
    pub query_parameters: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannelSpec {
    #[serde(default)]
    pub send_recovery: bool,
    #[serde(default)]
    pub send_failure: bool,
    #[serde(default)]
    pub send_degraded: bool,
    #[serde(default)]
    pub ssl_expiry: bool,
    /// Days before expiry; only forwarded when between 1 and 29.
    #[serde(default)]
    pub ssl_expiry_threshold: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opsgenie: Option<OpsGenieChannel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookChannel>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertChannelStatus {
    pub id: i64,
}

/// A notification sink that groups subscribe to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannel {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AlertChannelSpec,
    #[serde(default)]
    pub status: AlertChannelStatus,
}

impl_record!(AlertChannel, RecordKind::AlertChannel);

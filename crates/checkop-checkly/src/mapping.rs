//! Maps internal definitions onto Checkly payloads.
//!
//! Every function here is pure. A mapping failure is an
//! [`ApiError::Validation`] and must stop the sync before any call is made.

use std::collections::BTreeMap;

use checkop_core::defaults::{resolve, resolve_slice, resolve_str};
use checkop_core::{Assertion, KeyValue};
use url::Url;

use crate::error::ApiError;
use crate::types::{
    AlertChannelConfig, AlertChannelPayload, AlertChannelSubscription, AlertSettings,
    CheckPayload, GroupPayload, KeyValuePayload, RequestPayload,
};

/// Tag added to every resource this controller manages.
pub const OPERATOR_TAG: &str = "checkly-operator";

pub const DEFAULT_FREQUENCY: u32 = 5;
pub const DEFAULT_MAX_RESPONSE_TIME: u32 = 15_000;
pub const DEGRADED_RESPONSE_TIME: u32 = 5_000;
pub const DEFAULT_METHOD: &str = "GET";
pub const DEFAULT_BODY_TYPE: &str = "NONE";
pub const DEFAULT_SUCCESS: &str = "200";
pub const DEFAULT_GROUP_CONCURRENCY: u32 = 2;

/// Label keys containing this marker are never turned into group tags.
const ARGO_APP_MARKER: &str = "/argo-app";

fn default_group_locations() -> Vec<String> {
    vec!["eu-west-1".to_string()]
}

/// Everything needed to build a check payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckDefinition {
    pub name: String,
    pub namespace: Option<String>,
    pub endpoint: String,
    pub frequency: u32,
    pub max_response_time: u32,
    pub muted: bool,
    pub success: String,
    pub method: String,
    pub assertions: Vec<Assertion>,
    pub body: String,
    pub body_type: String,
    pub group_id: i64,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDefinition {
    pub name: String,
    pub activated: bool,
    pub locations: Vec<String>,
    pub private_locations: Vec<String>,
    pub alert_channels: Vec<AlertChannelSubscription>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpsGenieTarget {
    pub api_key: String,
    pub region: String,
    pub priority: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookTarget {
    pub name: String,
    pub url: String,
    pub webhook_type: String,
    pub method: String,
    pub template: String,
    pub webhook_secret: Option<String>,
    pub headers: Vec<KeyValue>,
    pub query_parameters: Vec<KeyValue>,
}

/// An alert channel with its secrets already resolved.
///
/// When more than one target is present the precedence is OpsGenie, then
/// email, then webhook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertChannelDefinition {
    pub name: String,
    pub send_recovery: bool,
    pub send_failure: bool,
    pub send_degraded: bool,
    pub ssl_expiry: bool,
    pub ssl_expiry_threshold: u32,
    pub opsgenie: Option<OpsGenieTarget>,
    pub email: Option<String>,
    pub webhook: Option<WebhookTarget>,
}

/// Flattens labels into sorted `key:value` tags.
pub fn label_tags<'a>(labels: impl IntoIterator<Item = (&'a String, &'a String)>) -> Vec<String> {
    let mut tags: Vec<String> = labels
        .into_iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect();
    tags.sort();
    tags
}

/// The assertions actually sent, and whether the check expects failure.
///
/// Without explicit assertions a status code assertion on the expected
/// success code is used. Only supplied assertions can mark a check as
/// expected to fail.
pub fn effective_assertions(assertions: &[Assertion], success: &str) -> (Vec<Assertion>, bool) {
    if assertions.is_empty() {
        let default = Assertion::status_code_equals(resolve_str(success, DEFAULT_SUCCESS));
        return (vec![default], false);
    }
    let should_fail = assertions.iter().any(Assertion::expects_failure);
    (assertions.to_vec(), should_fail)
}

/// Upper-cases the body type and canonicalizes JSON bodies.
pub fn canonical_body(body: &str, body_type: &str) -> Result<(String, String), ApiError> {
    let body_type = resolve_str(body_type, DEFAULT_BODY_TYPE).to_uppercase();
    if body_type != "JSON" || body.trim().is_empty() {
        return Ok((body.to_string(), body_type));
    }

    let parsed: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ApiError::validation(format!("invalid JSON body: {e}")))?;
    let canonical = serde_json::to_string(&parsed)
        .map_err(|e| ApiError::validation(format!("failed to format JSON body: {e}")))?;
    Ok((canonical, body_type))
}

pub fn check_payload(check: &CheckDefinition) -> Result<CheckPayload, ApiError> {
    Url::parse(&check.endpoint).map_err(|e| {
        ApiError::validation(format!("invalid endpoint {:?}: {e}", check.endpoint))
    })?;

    let (body, body_type) = canonical_body(&check.body, &check.body_type)?;
    let (assertions, should_fail) = effective_assertions(&check.assertions, &check.success);

    let mut tags = label_tags(&check.labels);
    tags.push(OPERATOR_TAG.to_string());
    if let Some(namespace) = check.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        tags.push(namespace.to_string());
    }

    Ok(CheckPayload {
        name: check.name.clone(),
        check_type: "API".to_string(),
        frequency: resolve(check.frequency, DEFAULT_FREQUENCY),
        degraded_response_time: DEGRADED_RESPONSE_TIME,
        max_response_time: resolve(check.max_response_time, DEFAULT_MAX_RESPONSE_TIME),
        activated: true,
        muted: check.muted,
        should_fail,
        double_check: false,
        ssl_check: false,
        locations: Vec::new(),
        tags,
        alert_settings: AlertSettings::default(),
        use_global_alert_settings: false,
        request: RequestPayload {
            method: resolve_str(&check.method, DEFAULT_METHOD).to_uppercase(),
            url: check.endpoint.clone(),
            assertions,
            headers: Vec::new(),
            query_parameters: Vec::new(),
            body,
            body_type,
        },
        group_id: check.group_id,
    })
}

pub fn group_payload(group: &GroupDefinition) -> GroupPayload {
    let mut tags = label_tags(
        group
            .labels
            .iter()
            .filter(|(key, _)| !key.contains(ARGO_APP_MARKER)),
    );
    tags.push(OPERATOR_TAG.to_string());

    GroupPayload {
        name: group.name.clone(),
        activated: group.activated,
        muted: false,
        double_check: false,
        concurrency: DEFAULT_GROUP_CONCURRENCY,
        locations: resolve_slice(&group.locations, &default_group_locations()).to_vec(),
        private_locations: group.private_locations.clone(),
        tags,
        alert_settings: AlertSettings::default(),
        use_global_alert_settings: false,
        alert_channel_subscriptions: group.alert_channels.clone(),
    }
}

fn key_values(values: &[KeyValue]) -> Vec<KeyValuePayload> {
    values
        .iter()
        .map(|kv| KeyValuePayload {
            key: kv.key.clone(),
            value: kv.value.clone(),
            locked: kv.locked,
        })
        .collect()
}

pub fn alert_channel_payload(
    channel: &AlertChannelDefinition,
) -> Result<AlertChannelPayload, ApiError> {
    let config = if let Some(opsgenie) = &channel.opsgenie {
        AlertChannelConfig::Opsgenie {
            name: channel.name.clone(),
            api_key: opsgenie.api_key.clone(),
            region: opsgenie.region.clone(),
            priority: opsgenie.priority.clone(),
        }
    } else if let Some(address) = channel.email.as_deref().filter(|a| !a.is_empty()) {
        AlertChannelConfig::Email {
            address: address.to_string(),
        }
    } else if let Some(webhook) = channel.webhook.as_ref().filter(|w| !w.name.is_empty()) {
        AlertChannelConfig::Webhook {
            name: webhook.name.clone(),
            url: webhook.url.clone(),
            webhook_type: webhook.webhook_type.clone(),
            method: resolve_str(&webhook.method, "POST").to_uppercase(),
            template: webhook.template.clone(),
            webhook_secret: webhook.webhook_secret.clone(),
            headers: key_values(&webhook.headers),
            query_parameters: key_values(&webhook.query_parameters),
        }
    } else {
        return Err(ApiError::validation(format!(
            "alert channel {} declares no opsgenie, email or webhook target",
            channel.name
        )));
    };

    let threshold = channel.ssl_expiry_threshold;
    Ok(AlertChannelPayload {
        config,
        send_recovery: channel.send_recovery,
        send_failure: channel.send_failure,
        send_degraded: channel.send_degraded,
        ssl_expiry: channel.ssl_expiry,
        ssl_expiry_threshold: (threshold > 0 && threshold < 30).then_some(threshold),
    })
}

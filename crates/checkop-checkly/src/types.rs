//! Wire payloads of the Checkly public API.

use checkop_core::Assertion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunBasedEscalation {
    pub failed_run_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBasedEscalation {
    pub minutes_failing_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub amount: u32,
    pub interval: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslCertificates {
    pub enabled: bool,
    pub alert_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertSettings {
    pub escalation_type: String,
    pub run_based_escalation: RunBasedEscalation,
    pub time_based_escalation: TimeBasedEscalation,
    pub reminders: Reminders,
    pub ssl_certificates: SslCertificates,
}

impl Default for AlertSettings {
    /// Run-based escalation after 5 failed runs, 5 minute reminders, SSL
    /// alerts disabled.
    fn default() -> Self {
        Self {
            escalation_type: "RUN_BASED".to_string(),
            run_based_escalation: RunBasedEscalation {
                failed_run_threshold: 5,
            },
            time_based_escalation: TimeBasedEscalation {
                minutes_failing_threshold: 5,
            },
            reminders: Reminders {
                amount: 0,
                interval: 5,
            },
            ssl_certificates: SslCertificates {
                enabled: false,
                alert_threshold: 3,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePayload {
    pub key: String,
    pub value: String,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPayload {
    pub method: String,
    pub url: String,
    pub assertions: Vec<Assertion>,
    pub headers: Vec<KeyValuePayload>,
    pub query_parameters: Vec<KeyValuePayload>,
    pub body: String,
    pub body_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckPayload {
    pub name: String,
    pub check_type: String,
    pub frequency: u32,
    pub degraded_response_time: u32,
    pub max_response_time: u32,
    pub activated: bool,
    pub muted: bool,
    pub should_fail: bool,
    pub double_check: bool,
    pub ssl_check: bool,
    pub locations: Vec<String>,
    pub tags: Vec<String>,
    pub alert_settings: AlertSettings,
    pub use_global_alert_settings: bool,
    pub request: RequestPayload,
    pub group_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannelSubscription {
    pub alert_channel_id: i64,
    pub activated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    pub name: String,
    pub activated: bool,
    pub muted: bool,
    pub double_check: bool,
    pub concurrency: u32,
    pub locations: Vec<String>,
    pub private_locations: Vec<String>,
    pub tags: Vec<String>,
    pub alert_settings: AlertSettings,
    pub use_global_alert_settings: bool,
    pub alert_channel_subscriptions: Vec<AlertChannelSubscription>,
}

/// Type-specific alert channel configuration, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertChannelConfig {
    Email {
        address: String,
    },
    #[serde(rename_all = "camelCase")]
    Opsgenie {
        name: String,
        api_key: String,
        region: String,
        priority: String,
    },
    #[serde(rename_all = "camelCase")]
    Webhook {
        name: String,
        url: String,
        webhook_type: String,
        method: String,
        template: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        webhook_secret: Option<String>,
        headers: Vec<KeyValuePayload>,
        query_parameters: Vec<KeyValuePayload>,
    },
}

impl AlertChannelConfig {
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Email { .. } => "EMAIL",
            Self::Opsgenie { .. } => "OPSGENIE",
            Self::Webhook { .. } => "WEBHOOK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertChannelPayload {
    #[serde(flatten)]
    pub config: AlertChannelConfig,
    pub send_recovery: bool,
    pub send_failure: bool,
    pub send_degraded: bool,
    pub ssl_expiry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_expiry_threshold: Option<u32>,
}

/// Created check as echoed back by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedCheck {
    pub id: String,
}

/// Created group or alert channel as echoed back by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedNumeric {
    pub id: i64,
}

//! Recent-events stream attached to records.

use std::fmt;

use checkop_core::RecordKey;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Warning => write!(f, "Warning"),
        }
    }
}

/// A short, user-facing note about something that happened to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEvent {
    pub key: RecordKey,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// CamelCase machine-readable reason, e.g. `Created`.
    pub reason: String,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl RecordEvent {
    pub fn normal(key: RecordKey, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventType::Normal, reason, message)
    }

    pub fn warning(key: RecordKey, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(key, EventType::Warning, reason, message)
    }

    fn new(
        key: RecordKey,
        event_type: EventType,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key,
            event_type,
            reason: reason.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Sink for record events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: RecordEvent);

    /// Events recorded for `key`, oldest first.
    fn recent(&self, key: &RecordKey) -> Vec<RecordEvent>;
}

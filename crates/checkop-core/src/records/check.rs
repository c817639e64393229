use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::meta::ObjectMeta;

/// Where an assertion reads its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionSource {
    StatusCode,
    JsonBody,
    Headers,
    TextBody,
    ResponseTime,
}

/// How an assertion compares the read value against its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssertionComparison {
    Equals,
    NotEquals,
    HasKey,
    NotHasKey,
    HasValue,
    NotHasValue,
    IsEmpty,
    NotEmpty,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    IsNull,
    NotNull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertion {
    pub source: AssertionSource,
    #[serde(default)]
    pub property: String,
    pub comparison: AssertionComparison,
    #[serde(default)]
    pub target: String,
}

impl Assertion {
    /// `STATUS_CODE EQUALS <target>`.
    pub fn status_code_equals(target: impl Into<String>) -> Self {
        Self {
            source: AssertionSource::StatusCode,
            property: String::new(),
            comparison: AssertionComparison::Equals,
            target: target.into(),
        }
    }

    /// A status-code equality assertion expecting a 4xx/5xx response.
    ///
    /// Targets that do not parse as an integer never count as failing.
    pub fn expects_failure(&self) -> bool {
        self.source == AssertionSource::StatusCode
            && self.comparison == AssertionComparison::Equals
            && self
                .target
                .trim()
                .parse::<u16>()
                .is_ok_and(|code| code >= 400)
    }
}

/// Desired-facing fields of a check. Equality on this type drives the diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckSpec {
    pub endpoint: String,
    /// Minutes between runs; 0 uses the adapter default.
    pub frequency: u32,
    /// Name of the owning group.
    pub group: String,
    /// Milliseconds; 0 uses the adapter default.
    pub max_response_time: u32,
    pub muted: bool,
    /// Expected status code, e.g. "200".
    pub success: String,
    pub method: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CheckStatus {
    /// External check id; empty until the first create succeeds.
    pub id: String,
    pub group_id: i64,
}

impl CheckStatus {
    pub fn external_id(&self) -> Option<&str> {
        (!self.id.is_empty()).then_some(self.id.as_str())
    }
}

/// A single externally hosted API check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedCheck {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: CheckSpec,
    #[serde(default)]
    pub status: CheckStatus,
}

impl ManagedCheck {
    pub fn new(metadata: ObjectMeta, spec: CheckSpec) -> Self {
        Self {
            metadata,
            spec,
            status: CheckStatus::default(),
        }
    }
}

impl_record!(ManagedCheck, RecordKind::ApiCheck);

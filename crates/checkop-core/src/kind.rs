use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The kinds of records the controller declares or reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordKind {
    /// A single external API check.
    ApiCheck,
    /// A bundle of checks sharing locations and alerting.
    Group,
    /// A notification sink groups subscribe to.
    AlertChannel,
    /// A parent object whose rules derive checks. Read only.
    Route,
    /// Opaque key/value data referenced by alert channels.
    Secret,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::ApiCheck,
        RecordKind::Group,
        RecordKind::AlertChannel,
        RecordKind::Route,
        RecordKind::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiCheck => "ApiCheck",
            Self::Group => "Group",
            Self::AlertChannel => "AlertChannel",
            Self::Route => "Route",
            Self::Secret => "Secret",
        }
    }

    /// Whether records of this kind live outside any namespace.
    pub fn is_cluster_scoped(&self) -> bool {
        matches!(self, Self::Group | Self::AlertChannel)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::unknown_kind(s))
    }
}

/// Identity of a single record: kind, optional namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub kind: RecordKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
}

impl RecordKey {
    pub fn new(kind: RecordKind, namespace: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.map(str::to_string),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trip_through_str() {
        for kind in RecordKind::ALL {
            assert_eq!(kind.as_str().parse::<RecordKind>().unwrap(), kind);
        }
        assert!("Ingress".parse::<RecordKind>().is_err());
    }

    #[test]
    fn test_key_display() {
        let key = RecordKey::new(RecordKind::ApiCheck, Some("web"), "home");
        assert_eq!(key.to_string(), "ApiCheck/web/home");

        let key = RecordKey::new(RecordKind::Group, None, "ops");
        assert_eq!(key.to_string(), "Group/ops");
    }
}

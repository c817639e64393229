use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::meta::ObjectMeta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSpec {
    pub locations: Vec<String>,
    pub private_locations: Vec<String>,
    pub activated: bool,
    /// Names of subscribed alert channels.
    pub alert_channels: Vec<String>,
}

impl Default for GroupSpec {
    fn default() -> Self {
        Self {
            locations: Vec::new(),
            private_locations: Vec::new(),
            activated: true,
            alert_channels: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupStatus {
    /// External group id; 0 until created.
    pub id: i64,
}

/// A bundle of checks sharing locations and alert subscriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckGroup {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: GroupSpec,
    #[serde(default)]
    pub status: GroupStatus,
}

impl_record!(CheckGroup, RecordKind::Group);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_is_activated_by_default() {
        let group: CheckGroup =
            serde_json::from_value(serde_json::json!({"metadata": {"name": "ops"}})).unwrap();
        assert!(group.spec.activated);
        assert_eq!(group.status.id, 0);
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::meta::ObjectMeta;

/// Opaque key/value data, read by alert channels for credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    /// The value for `key`, treating empty strings as absent.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl_record!(Secret, RecordKind::Secret);

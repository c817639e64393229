use serde::{Deserialize, Serialize};

use crate::kind::RecordKind;
use crate::meta::ObjectMeta;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub host: String,
    /// `None` or empty means the root path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<Vec<String>>,
}

impl RouteRule {
    /// The rule's paths, with the implicit root when none are declared.
    pub fn effective_paths(&self) -> Vec<&str> {
        match &self.paths {
            Some(paths) if !paths.is_empty() => paths.iter().map(String::as_str).collect(),
            _ => vec!["/"],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSpec {
    pub rules: Vec<RouteRule>,
}

/// A parent object whose rules and annotations derive checks.
///
/// Routes are never written by the controller apart from its finalizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: RouteSpec,
}

impl_record!(Route, RecordKind::Route);

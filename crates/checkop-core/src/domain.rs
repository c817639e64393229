//! The controller domain namespaces finalizer and annotation keys.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTROLLER_DOMAIN: &str = "k8s.checklyhq.com";

/// Route annotations the controller recognises, relative to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKey {
    Enabled,
    Path,
    Endpoint,
    Success,
    Group,
    Muted,
}

impl AnnotationKey {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Path => "path",
            Self::Endpoint => "endpoint",
            Self::Success => "success",
            Self::Group => "group",
            Self::Muted => "muted",
        }
    }
}

/// A single domain string, e.g. `k8s.checklyhq.com`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControllerDomain(String);

impl ControllerDomain {
    pub fn new(domain: impl Into<String>) -> Self {
        Self(domain.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The finalizer key guarding external cleanup, `<domain>/finalizer`.
    pub fn finalizer(&self) -> String {
        format!("{}/finalizer", self.0)
    }

    /// The full annotation key, `<domain>/<suffix>`.
    pub fn annotation(&self, key: AnnotationKey) -> String {
        format!("{}/{}", self.0, key.suffix())
    }
}

impl Default for ControllerDomain {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROLLER_DOMAIN)
    }
}

impl fmt::Display for ControllerDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

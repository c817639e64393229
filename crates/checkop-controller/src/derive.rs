//! Expands a route's rules and annotations into the checks it owns.
//!
//! Derivation is pure: the same route metadata, rules and annotations always
//! produce the same checks, in the same order, with the same names.

use std::collections::BTreeMap;

use checkop_core::{
    AnnotationKey, CheckSpec, ControllerDomain, ManagedCheck, ObjectMeta, OwnerReference,
    RecordKind, RouteRule,
};
use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::ReconcileError;

/// Label tying a derived check back to the route that declared it.
pub const OWNER_LABEL: &str = "route-controller";

const DEFAULT_SUCCESS: &str = "200";

/// The route annotations the controller reads, already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAnnotations {
    pub enabled: bool,
    pub path: Option<String>,
    pub endpoint: Option<String>,
    pub success: String,
    pub group: Option<String>,
    pub muted: bool,
}

impl RouteAnnotations {
    /// Reads the recognised keys under `domain`.
    ///
    /// A route is enabled when the enable annotation is present and not
    /// `"false"`. Checks are muted unless the mute annotation is `"false"`.
    pub fn parse(annotations: &BTreeMap<String, String>, domain: &ControllerDomain) -> Self {
        let get = |key: AnnotationKey| {
            annotations
                .get(&domain.annotation(key))
                .map(String::as_str)
        };
        let non_empty = |key: AnnotationKey| {
            get(key)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        Self {
            enabled: get(AnnotationKey::Enabled).is_some_and(|value| value != "false"),
            path: non_empty(AnnotationKey::Path),
            endpoint: non_empty(AnnotationKey::Endpoint),
            success: non_empty(AnnotationKey::Success)
                .unwrap_or_else(|| DEFAULT_SUCCESS.to_string()),
            group: non_empty(AnnotationKey::Group),
            muted: get(AnnotationKey::Muted) != Some("false"),
        }
    }
}

/// Name of the check derived for `(parent, host, path)`.
///
/// Path separators and dots are stripped, then leading and trailing dashes
/// trimmed: `("test-ingress", "foo.bar", "/baz")` gives
/// `test-ingress-foobar-baz`.
pub fn check_name(parent: &str, host: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    format!("{parent}-{host}-{path}")
        .replace(['/', '.'], "")
        .trim_matches('-')
        .to_string()
}

/// Endpoint probed by the check derived for `(host, path)`.
pub fn check_endpoint(host: &str, path: &str) -> String {
    format!("https://{host}/{}", path.trim_start_matches('/'))
}

/// Derives the desired checks for one route.
///
/// Fails without returning any check when the group annotation is missing.
/// Two rules deriving the same name are merged when their specs agree and
/// rejected otherwise.
pub fn derive_checks(
    parent: &ObjectMeta,
    rules: &[RouteRule],
    annotations: &RouteAnnotations,
) -> Result<Vec<ManagedCheck>, ReconcileError> {
    let group = annotations.group.as_deref().ok_or_else(|| {
        ReconcileError::validation(format!(
            "route {} has no group annotation, can't derive checks without one",
            parent.name
        ))
    })?;

    let mut derived: IndexMap<String, ManagedCheck> = IndexMap::new();
    for rule in rules {
        let host = annotations.endpoint.as_deref().unwrap_or(&rule.host);
        let declared = rule.paths.as_ref().is_some_and(|paths| !paths.is_empty());
        for path in rule.effective_paths() {
            // The path override replaces declared paths only; the implicit
            // root of a rule without paths is kept.
            let path = match annotations.path.as_deref() {
                Some(path) if declared => path,
                _ if path.is_empty() => "/",
                _ => path,
            };

            let name = check_name(&parent.name, host, path);
            let spec = CheckSpec {
                endpoint: check_endpoint(host, path),
                group: group.to_string(),
                success: annotations.success.clone(),
                muted: annotations.muted,
                ..Default::default()
            };

            match derived.entry(name) {
                Entry::Occupied(existing) if existing.get().spec == spec => {}
                Entry::Occupied(existing) => {
                    return Err(ReconcileError::validation(format!(
                        "rules of route {} derive check {} twice with different endpoints ({} and {})",
                        parent.name,
                        existing.key(),
                        existing.get().spec.endpoint,
                        spec.endpoint
                    )));
                }
                Entry::Vacant(slot) => {
                    let metadata = owned_metadata(parent, slot.key());
                    slot.insert(ManagedCheck::new(metadata, spec));
                }
            }
        }
    }

    Ok(derived.into_values().collect())
}

fn owned_metadata(parent: &ObjectMeta, name: &str) -> ObjectMeta {
    let mut metadata = ObjectMeta::new(name);
    metadata.namespace = parent.namespace.clone();
    metadata
        .labels
        .insert(OWNER_LABEL.to_string(), parent.name.clone());
    metadata.owner_references.push(OwnerReference {
        kind: RecordKind::Route.to_string(),
        name: parent.name.clone(),
        uid: parent.uid.clone().unwrap_or_default(),
    });
    metadata
}

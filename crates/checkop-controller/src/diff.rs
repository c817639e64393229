//! Partitions existing and desired checks into create, update and delete sets.

use std::collections::BTreeMap;

use checkop_core::ManagedCheck;

/// The actions needed to move the existing checks onto the desired ones.
///
/// Each list is sorted by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffPlan {
    /// Desired checks with no existing counterpart.
    pub create: Vec<ManagedCheck>,
    /// Existing checks carrying the desired spec. Metadata and status are
    /// the existing ones so the write is guarded by their resource version.
    pub update: Vec<ManagedCheck>,
    /// Existing checks no longer desired.
    pub delete: Vec<ManagedCheck>,
}

impl DiffPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

/// Compares existing checks against desired ones by name.
///
/// Only specs are compared; identifiers, metadata and status never cause an
/// update. A later desired entry replaces an earlier one with the same name.
pub fn plan(existing: Vec<ManagedCheck>, desired: Vec<ManagedCheck>) -> DiffPlan {
    let mut desired: BTreeMap<String, ManagedCheck> = desired
        .into_iter()
        .map(|check| (check.metadata.name.clone(), check))
        .collect();
    let existing: BTreeMap<String, ManagedCheck> = existing
        .into_iter()
        .map(|check| (check.metadata.name.clone(), check))
        .collect();

    let mut plan = DiffPlan::default();
    for (name, mut current) in existing {
        match desired.remove(&name) {
            Some(wanted) if wanted.spec == current.spec => {
                tracing::trace!(check = %name, "Check spec unchanged");
            }
            Some(wanted) => {
                tracing::debug!(check = %name, "Check spec changed");
                current.spec = wanted.spec;
                plan.update.push(current);
            }
            None => plan.delete.push(current),
        }
    }
    plan.create = desired.into_values().collect();
    plan
}

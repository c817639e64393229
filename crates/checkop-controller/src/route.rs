//! Route reconciliation: derive the desired checks, diff them against the
//! checks the route already owns, then create, update and delete.
//!
//! Actions run in a fixed order (creates, updates, deletes, each sorted by
//! name) and the first failure aborts the pass. Nothing is rolled back; the
//! next pass diffs again from whatever state was reached.

use checkop_core::{ControllerDomain, ManagedCheck, Record, Route};
use checkop_storage::{
    DynEventRecorder, DynStore, LabelSelector, RecordEvent, TypedRecordStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::derive::{OWNER_LABEL, RouteAnnotations, derive_checks};
use crate::diff::{DiffPlan, plan};
use crate::error::{ReconcileError, ReconcileOutcome, ReconcileResult};
use crate::lifecycle::ignore_missing;

/// Counts of the actions one pass applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteSyncSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Clone)]
pub struct RouteReconciler {
    store: DynStore,
    events: DynEventRecorder,
    domain: ControllerDomain,
    finalizer: String,
}

impl RouteReconciler {
    pub fn new(store: DynStore, events: DynEventRecorder, domain: &ControllerDomain) -> Self {
        Self {
            store,
            events,
            domain: domain.clone(),
            finalizer: domain.finalizer(),
        }
    }

    pub async fn reconcile(
        &self,
        namespace: Option<&str>,
        name: &str,
        cancel: &CancellationToken,
    ) -> ReconcileResult {
        let Some(mut route) = self.store.get_record::<Route>(namespace, name).await? else {
            debug!(route = %name, "Route gone, nothing to reconcile");
            return Ok(ReconcileOutcome::Done);
        };
        let key = route.key();
        let annotations = RouteAnnotations::parse(&route.metadata.annotations, &self.domain);

        if route.metadata.is_deleting() || !annotations.enabled {
            let owned = self.owned_checks(&route).await?;
            let removed = self.delete_checks(&owned, cancel).await?;
            if removed > 0 {
                info!(route = %key, removed, "Removed checks of unmanaged route");
            }
            if route.metadata.remove_finalizer(&self.finalizer) {
                ignore_missing(self.store.update_record(&route).await)?;
                info!(route = %key, "Removed finalizer");
            }
            return Ok(ReconcileOutcome::Done);
        }

        if route.metadata.add_finalizer(&self.finalizer) {
            ignore_missing(self.store.update_record(&route).await)?;
            info!(route = %key, finalizer = %self.finalizer, "Added finalizer");
            return Ok(ReconcileOutcome::Done);
        }

        let desired = derive_checks(&route.metadata, &route.spec.rules, &annotations)?;
        let existing = self.owned_checks(&route).await?;
        let diff = plan(existing, desired);
        if diff.is_empty() {
            debug!(route = %key, "Owned checks up to date");
            return Ok(ReconcileOutcome::Done);
        }

        let summary = self.apply(&route, diff, cancel).await?;
        info!(
            route = %key,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "Route checks reconciled"
        );
        self.events.record(RecordEvent::normal(
            key,
            "ChecksSynced",
            format!(
                "{} created, {} updated, {} deleted",
                summary.created, summary.updated, summary.deleted
            ),
        ));
        Ok(ReconcileOutcome::Done)
    }

    /// Checks labelled with and owned by `route`, by name.
    pub async fn owned_checks(&self, route: &Route) -> Result<Vec<ManagedCheck>, ReconcileError> {
        let selector = LabelSelector::everything().with_label(OWNER_LABEL, &route.metadata.name);
        let checks = self
            .store
            .list_records::<ManagedCheck>(route.metadata.namespace.as_deref(), &selector)
            .await?;

        Ok(checks
            .into_iter()
            .filter(|check| owns(route, check))
            .collect())
    }

    async fn apply(
        &self,
        route: &Route,
        diff: DiffPlan,
        cancel: &CancellationToken,
    ) -> Result<RouteSyncSummary, ReconcileError> {
        let mut summary = RouteSyncSummary::default();

        for check in &diff.create {
            ensure_active(cancel)?;
            match self.store.create_record(check).await {
                Ok(_) => {
                    info!(check = %check.metadata.name, endpoint = %check.spec.endpoint, "Created check");
                    summary.created += 1;
                }
                Err(err) if err.is_already_exists() => {
                    if self.adopt_existing(route, check).await? {
                        summary.updated += 1;
                    }
                }
                Err(err) => return Err(err.into()),
            }
        }

        for check in &diff.update {
            ensure_active(cancel)?;
            if ignore_missing(self.store.update_record(check).await)?.is_some() {
                info!(check = %check.metadata.name, "Updated check");
                summary.updated += 1;
            }
        }

        summary.deleted = self.delete_checks(&diff.delete, cancel).await?;
        Ok(summary)
    }

    /// Handles a derived check whose name is already taken.
    ///
    /// A check this route owns (created by an interrupted pass, or not yet
    /// visible to the owned-set query) gets the derived spec. Any other check
    /// is a naming conflict.
    async fn adopt_existing(
        &self,
        route: &Route,
        check: &ManagedCheck,
    ) -> Result<bool, ReconcileError> {
        let namespace = check.metadata.namespace.as_deref();
        let Some(mut existing) = self
            .store
            .get_record::<ManagedCheck>(namespace, &check.metadata.name)
            .await?
        else {
            return Ok(false);
        };

        if !owns(route, &existing) {
            return Err(ReconcileError::validation(format!(
                "check {} exists and is not owned by route {}",
                check.metadata.name, route.metadata.name
            )));
        }
        if existing.spec == check.spec {
            debug!(check = %check.metadata.name, "Check already exists");
            return Ok(false);
        }

        existing.spec = check.spec.clone();
        let updated = ignore_missing(self.store.update_record(&existing).await)?.is_some();
        if updated {
            info!(check = %check.metadata.name, "Updated existing check");
        }
        Ok(updated)
    }

    async fn delete_checks(
        &self,
        checks: &[ManagedCheck],
        cancel: &CancellationToken,
    ) -> Result<usize, ReconcileError> {
        let mut deleted = 0;
        for check in checks {
            if check.metadata.is_deleting() {
                continue;
            }
            ensure_active(cancel)?;
            let result = self
                .store
                .delete_record::<ManagedCheck>(check.metadata.namespace.as_deref(), &check.metadata.name)
                .await;
            if ignore_missing(result)?.is_some() {
                info!(check = %check.metadata.name, "Deleted check");
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

/// Whether `check` carries the route's owner label and, when the route has a
/// uid, its owner reference.
fn owns(route: &Route, check: &ManagedCheck) -> bool {
    let labelled = check
        .metadata
        .labels
        .get(OWNER_LABEL)
        .is_some_and(|owner| *owner == route.metadata.name);
    labelled
        && route
            .metadata
            .uid
            .as_deref()
            .is_none_or(|uid| check.metadata.is_owned_by(uid))
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), ReconcileError> {
    if cancel.is_cancelled() {
        return Err(ReconcileError::Cancelled);
    }
    Ok(())
}

mod common;

use checkop_controller::derive::OWNER_LABEL;
use checkop_controller::{CheckReconciler, ReconcileOutcome, RouteReconciler};
use checkop_core::{AnnotationKey, CheckSpec, ManagedCheck, ObjectMeta, Record, Route};
use checkop_storage::{EventRecorder, LabelSelector, TypedRecordStore};
use common::{Call, Harness, rule};
use tokio_util::sync::CancellationToken;

fn routes(h: &Harness) -> RouteReconciler {
    RouteReconciler::new(h.store.clone(), h.events.clone(), &h.domain)
}

async fn check_names(h: &Harness) -> Vec<String> {
    h.store
        .list_records::<ManagedCheck>(Some("web"), &LabelSelector::everything())
        .await
        .unwrap()
        .into_iter()
        .map(|check| check.metadata.name)
        .collect()
}

async fn stored_route(h: &Harness, name: &str) -> Option<Route> {
    h.store.get_record::<Route>(Some("web"), name).await.unwrap()
}

/// Creates the route and runs the pass that attaches the finalizer.
async fn managed_route(h: &Harness, route: Route) -> Route {
    let name = route.metadata.name.clone();
    h.store.create_record(&route).await.unwrap();
    routes(h)
        .reconcile(Some("web"), &name, &CancellationToken::new())
        .await
        .unwrap();
    stored_route(h, &name).await.unwrap()
}

#[tokio::test]
async fn test_route_derives_and_syncs_check() {
    let h = Harness::new();
    h.synced_group("my-group", 42).await;
    let mut route = h.route(
        "test-ingress",
        "web",
        &[
            (AnnotationKey::Enabled, "true"),
            (AnnotationKey::Group, "my-group"),
        ],
    );
    route.spec.rules = vec![rule("foo.bar", &["/baz"])];
    let route = managed_route(&h, route).await;
    assert!(route.metadata.has_finalizer(&h.finalizer()));
    assert!(check_names(&h).await.is_empty());

    let cancel = CancellationToken::new();
    routes(&h).reconcile(Some("web"), "test-ingress", &cancel).await.unwrap();

    let check = h
        .store
        .get_record::<ManagedCheck>(Some("web"), "test-ingress-foobar-baz")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(check.spec.endpoint, "https://foo.bar/baz");
    assert_eq!(check.spec.success, "200");
    assert_eq!(check.spec.group, "my-group");
    assert!(check.spec.muted);
    assert_eq!(check.metadata.labels[OWNER_LABEL], "test-ingress");
    assert!(
        check
            .metadata
            .is_owned_by(route.metadata.uid.as_deref().unwrap())
    );

    // The derived check then goes through its own lifecycle.
    let checks = CheckReconciler::new(h.store.clone(), h.events.clone(), h.adapter.clone(), &h.domain);
    checks
        .reconcile(Some("web"), "test-ingress-foobar-baz", &cancel)
        .await
        .unwrap();
    checks
        .reconcile(Some("web"), "test-ingress-foobar-baz", &cancel)
        .await
        .unwrap();
    assert_eq!(
        h.api.calls(),
        vec![Call::CreateCheck("test-ingress-foobar-baz".into())]
    );
    let payload = h.api.check("check-100").unwrap();
    assert_eq!(payload.group_id, 42);
    assert!(payload.muted);
}

#[tokio::test]
async fn test_route_converges_on_rule_change() {
    let h = Harness::new();
    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &["/a", "/b", "/c"])];
    managed_route(&h, route).await;
    let reconciler = routes(&h);
    let cancel = CancellationToken::new();

    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();
    assert_eq!(
        check_names(&h).await,
        vec!["site-aexample-a", "site-aexample-b", "site-aexample-c"]
    );

    let mut route = stored_route(&h, "site").await.unwrap();
    route.spec.rules = vec![rule("a.example", &["/b", "/c", "/d"])];
    h.store.update_record(&route).await.unwrap();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();

    assert_eq!(
        check_names(&h).await,
        vec!["site-aexample-b", "site-aexample-c", "site-aexample-d"]
    );
    let reasons: Vec<_> = h
        .log
        .recent(&route.key())
        .into_iter()
        .map(|event| (event.reason, event.message))
        .collect();
    assert_eq!(
        reasons,
        vec![
            ("ChecksSynced".to_string(), "3 created, 0 updated, 0 deleted".to_string()),
            ("ChecksSynced".to_string(), "1 created, 0 updated, 1 deleted".to_string()),
        ]
    );

    // A converged route applies nothing.
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();
    assert_eq!(h.log.recent(&route.key()).len(), 2);
}

#[tokio::test]
async fn test_annotation_change_updates_checks_and_keeps_status() {
    let h = Harness::new();
    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &[])];
    managed_route(&h, route).await;
    let reconciler = routes(&h);
    let cancel = CancellationToken::new();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();

    let mut check = h
        .store
        .get_record::<ManagedCheck>(Some("web"), "site-aexample")
        .await
        .unwrap()
        .unwrap();
    check.status.id = "check-7".into();
    h.store.update_record_status(&check).await.unwrap();

    let mut route = stored_route(&h, "site").await.unwrap();
    route.metadata.annotations.insert(
        h.domain.annotation(AnnotationKey::Success),
        "204".into(),
    );
    route.metadata.annotations.insert(
        h.domain.annotation(AnnotationKey::Muted),
        "false".into(),
    );
    h.store.update_record(&route).await.unwrap();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();

    let check = h
        .store
        .get_record::<ManagedCheck>(Some("web"), "site-aexample")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(check.spec.success, "204");
    assert!(!check.spec.muted);
    assert_eq!(check.spec.endpoint, "https://a.example/");
    assert_eq!(check.status.id, "check-7");
}

#[tokio::test]
async fn test_disabled_route_removes_its_checks() {
    let h = Harness::new();
    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &["/a", "/b"])];
    managed_route(&h, route).await;
    let reconciler = routes(&h);
    let cancel = CancellationToken::new();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();
    assert_eq!(check_names(&h).await.len(), 2);

    let mut route = stored_route(&h, "site").await.unwrap();
    route
        .metadata
        .annotations
        .insert(h.domain.annotation(AnnotationKey::Enabled), "false".into());
    h.store.update_record(&route).await.unwrap();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();

    assert!(check_names(&h).await.is_empty());
    let route = stored_route(&h, "site").await.unwrap();
    assert!(!route.metadata.has_finalizer(&h.finalizer()));
}

#[tokio::test]
async fn test_deleted_route_removes_checks_then_itself() {
    let h = Harness::new();
    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &["/a"])];
    managed_route(&h, route).await;
    let reconciler = routes(&h);
    let cancel = CancellationToken::new();
    reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();

    h.store
        .delete_record::<Route>(Some("web"), "site")
        .await
        .unwrap();
    assert!(stored_route(&h, "site").await.unwrap().metadata.is_deleting());

    let outcome = reconciler.reconcile(Some("web"), "site", &cancel).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Done);
    assert!(check_names(&h).await.is_empty());
    assert!(stored_route(&h, "site").await.is_none());
}

#[tokio::test]
async fn test_missing_group_annotation_creates_nothing() {
    let h = Harness::new();
    let mut route = h.route("site", "web", &[(AnnotationKey::Enabled, "true")]);
    route.spec.rules = vec![rule("a.example", &["/a"])];
    managed_route(&h, route).await;

    let err = routes(&h)
        .reconcile(Some("web"), "site", &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(check_names(&h).await.is_empty());
}

#[tokio::test]
async fn test_checks_of_other_owners_are_left_alone() {
    let h = Harness::new();
    let mut foreign = ManagedCheck::new(
        ObjectMeta::namespaced("site-legacy", "web"),
        CheckSpec {
            endpoint: "https://legacy.example/".into(),
            group: "ops".into(),
            ..Default::default()
        },
    );
    foreign
        .metadata
        .labels
        .insert(OWNER_LABEL.to_string(), "site".to_string());
    h.store.create_record(&foreign).await.unwrap();

    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &["/a"])];
    managed_route(&h, route).await;
    routes(&h)
        .reconcile(Some("web"), "site", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(check_names(&h).await, vec!["site-aexample-a", "site-legacy"]);
}

#[tokio::test]
async fn test_name_taken_by_unowned_check_is_a_conflict() {
    let h = Harness::new();
    let other = ManagedCheck::new(
        ObjectMeta::namespaced("site-aexample-a", "web"),
        CheckSpec {
            endpoint: "https://other.example/".into(),
            group: "ops".into(),
            ..Default::default()
        },
    );
    h.store.create_record(&other).await.unwrap();

    let mut route = h.route(
        "site",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("a.example", &["/a"])];
    let route = managed_route(&h, route).await;
    let reconciler = routes(&h);
    let cancel = CancellationToken::new();

    for _ in 0..2 {
        let err = reconciler
            .reconcile(Some("web"), "site", &cancel)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("not owned by route site"));
    }

    let stored = h
        .store
        .get_record::<ManagedCheck>(Some("web"), "site-aexample-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.spec.endpoint, "https://other.example/");
    assert!(stored.metadata.labels.is_empty());
    assert!(h.log.recent(&route.key()).is_empty());
}

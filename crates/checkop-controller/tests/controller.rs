mod common;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use checkop_controller::{Controller, SchedulerOptions};
use checkop_core::{
    AnnotationKey, CheckGroup, ManagedCheck, ObjectMeta, RecordKey, RecordKind, Route,
};
use checkop_db_memory::InMemoryStore;
use checkop_storage::{
    ChangeBroadcaster, DynStore, EventRecorder, EventType, EventedStore, LabelSelector,
    TypedRecordStore,
};
use common::{Harness, rule};
use tokio_util::sync::CancellationToken;

fn fast_options() -> SchedulerOptions {
    SchedulerOptions {
        workers: 2,
        resync_interval: Duration::from_secs(60),
        max_retries: 50,
        retry_base: Duration::from_millis(10),
        retry_max: Duration::from_millis(50),
        not_ready_delay: Duration::from_millis(20),
    }
}

/// Polls `condition` until it holds, failing the test after five seconds.
async fn eventually<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct Running {
    h: Harness,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

fn start(options: SchedulerOptions) -> Running {
    let broadcaster = ChangeBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(
        InMemoryStore::new(),
        broadcaster.clone(),
    ));
    let h = Harness::with_store(store);
    let controller = Arc::new(Controller::new(
        h.store.clone(),
        h.events.clone(),
        h.adapter.clone(),
        &h.domain,
        options,
    ));
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(
        Arc::clone(&controller).run(broadcaster.subscribe(), cancel.clone()),
    );
    Running {
        h,
        cancel,
        handle,
    }
}

impl Running {
    async fn stop(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("controller should stop")
            .expect("controller task should not panic");
    }
}

async fn synced_checks(h: &Harness) -> Vec<ManagedCheck> {
    h.store
        .list_records::<ManagedCheck>(Some("web"), &LabelSelector::everything())
        .await
        .unwrap()
        .into_iter()
        .filter(|check| check.status.external_id().is_some())
        .collect()
}

#[tokio::test]
async fn test_route_to_external_check_and_back() {
    let running = start(fast_options());
    let h = &running.h;

    // The route and its group arrive together; the check waits for the group.
    let mut route = h.route(
        "shop",
        "web",
        &[(AnnotationKey::Enabled, "true"), (AnnotationKey::Group, "ops")],
    );
    route.spec.rules = vec![rule("shop.example.com", &["/health", "/ready"])];
    h.store.create_record(&route).await.unwrap();
    h.store
        .create_record(&CheckGroup {
            metadata: ObjectMeta::new("ops"),
            ..Default::default()
        })
        .await
        .unwrap();

    eventually("both checks synced", || async move {
        synced_checks(h).await.len() == 2
    })
    .await;
    assert_eq!(h.api.check_count(), 2);
    let group = h
        .store
        .get_record::<CheckGroup>(None, "ops")
        .await
        .unwrap()
        .unwrap();
    for check in synced_checks(h).await {
        assert_eq!(check.status.group_id, group.status.id);
    }

    // Deleting the route removes the checks externally, then the route.
    h.store
        .delete_record::<Route>(Some("web"), "shop")
        .await
        .unwrap();
    eventually("route and checks gone", || async move {
        h.store
            .get_record::<Route>(Some("web"), "shop")
            .await
            .unwrap()
            .is_none()
            && h.api.check_count() == 0
            && h
                .store
                .list_records::<ManagedCheck>(Some("web"), &LabelSelector::everything())
                .await
                .unwrap()
                .is_empty()
    })
    .await;

    running.stop().await;
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let running = start(fast_options());
    let h = &running.h;
    h.api.fail_creates(true);

    h.store
        .create_record(&CheckGroup {
            metadata: ObjectMeta::new("ops"),
            ..Default::default()
        })
        .await
        .unwrap();

    let key = &RecordKey::new(RecordKind::Group, None, "ops");
    eventually("a sync failure event", || async move {
        h.log
            .recent(key)
            .iter()
            .any(|event| event.event_type == EventType::Warning && event.reason == "SyncFailed")
    })
    .await;

    h.api.fail_creates(false);
    eventually("group synced after retry", || async move {
        h.store
            .get_record::<CheckGroup>(None, "ops")
            .await
            .unwrap()
            .is_some_and(|group| group.status.id != 0)
    })
    .await;

    running.stop().await;
}

#[tokio::test]
async fn test_exhausted_retries_are_reported() {
    let running = start(SchedulerOptions {
        max_retries: 2,
        ..fast_options()
    });
    let h = &running.h;
    h.api.fail_creates(true);

    h.store
        .create_record(&CheckGroup {
            metadata: ObjectMeta::new("ops"),
            ..Default::default()
        })
        .await
        .unwrap();

    let key = &RecordKey::new(RecordKind::Group, None, "ops");
    eventually("retries exhausted", || async move {
        h.log
            .recent(key)
            .iter()
            .any(|event| event.reason == "RetriesExhausted")
    })
    .await;

    running.stop().await;
}

#[tokio::test]
async fn test_resync_queues_existing_records() {
    let broadcaster = ChangeBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(
        InMemoryStore::new(),
        broadcaster.clone(),
    ));
    let h = Harness::with_store(store);
    for name in ["a", "b"] {
        h.store
            .create_record(&CheckGroup {
                metadata: ObjectMeta::new(name),
                ..Default::default()
            })
            .await
            .unwrap();
    }
    let controller = Controller::new(
        h.store.clone(),
        h.events.clone(),
        h.adapter.clone(),
        &h.domain,
        fast_options(),
    );

    assert_eq!(controller.resync().await.unwrap(), 2);
    assert_eq!(controller.queue().len(), 2);
    // Queueing again does not duplicate pending keys.
    assert_eq!(controller.resync().await.unwrap(), 2);
    assert_eq!(controller.queue().len(), 2);
}

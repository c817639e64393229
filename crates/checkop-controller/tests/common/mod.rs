#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use checkop_checkly::{
    AlertChannelPayload, ApiError, CheckPayload, GroupPayload, MonitoringApi, SyncAdapter,
};
use checkop_core::{
    AnnotationKey, CheckGroup, ControllerDomain, GroupSpec, GroupStatus, ObjectMeta, Route,
    RouteRule, RouteSpec,
};
use checkop_db_memory::{InMemoryEventLog, InMemoryStore};
use checkop_storage::{DynEventRecorder, DynStore, TypedRecordStore};

/// A single call made against [`FakeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateCheck(String),
    UpdateCheck(String),
    DeleteCheck(String),
    CreateGroup(String),
    UpdateGroup(i64),
    DeleteGroup(i64),
    CreateAlertChannel,
    UpdateAlertChannel(i64),
    DeleteAlertChannel(i64),
}

/// In-process stand-in for the monitoring service.
///
/// Records every call, hands out increasing ids and keeps the last payload
/// per external check id, plus every check payload in the order it was sent.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    checks: Mutex<BTreeMap<String, CheckPayload>>,
    sent_checks: Mutex<Vec<CheckPayload>>,
    groups: Mutex<BTreeMap<i64, GroupPayload>>,
    next_id: AtomicI64,
    fail_deletes: AtomicBool,
    fail_creates: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(100),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn check(&self, id: &str) -> Option<CheckPayload> {
        self.checks.lock().unwrap().get(id).cloned()
    }

    /// Every check payload passed to create or update, oldest first.
    pub fn sent_checks(&self) -> Vec<CheckPayload> {
        self.sent_checks.lock().unwrap().clone()
    }

    pub fn check_count(&self) -> usize {
        self.checks.lock().unwrap().len()
    }

    pub fn group(&self, id: i64) -> Option<GroupPayload> {
        self.groups.lock().unwrap().get(&id).cloned()
    }

    /// Makes every delete fail with a transient error until reset.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Makes every create fail with a transient error until reset.
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_create(&self) -> Result<(), ApiError> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(ApiError::transient("503 Service Unavailable"));
        }
        Ok(())
    }

    fn check_delete(&self) -> Result<(), ApiError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ApiError::transient("503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl MonitoringApi for FakeApi {
    async fn create_check(&self, check: &CheckPayload) -> Result<String, ApiError> {
        self.push(Call::CreateCheck(check.name.clone()));
        self.check_create()?;
        self.sent_checks.lock().unwrap().push(check.clone());
        let id = format!("check-{}", self.next_id());
        self.checks.lock().unwrap().insert(id.clone(), check.clone());
        Ok(id)
    }

    async fn update_check(&self, id: &str, check: &CheckPayload) -> Result<(), ApiError> {
        self.push(Call::UpdateCheck(id.to_string()));
        self.sent_checks.lock().unwrap().push(check.clone());
        let mut checks = self.checks.lock().unwrap();
        match checks.get_mut(id) {
            Some(existing) => {
                *existing = check.clone();
                Ok(())
            }
            None => Err(ApiError::not_found("check", id)),
        }
    }

    async fn delete_check(&self, id: &str) -> Result<(), ApiError> {
        self.push(Call::DeleteCheck(id.to_string()));
        self.check_delete()?;
        match self.checks.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found("check", id)),
        }
    }

    async fn create_group(&self, group: &GroupPayload) -> Result<i64, ApiError> {
        self.push(Call::CreateGroup(group.name.clone()));
        self.check_create()?;
        let id = self.next_id();
        self.groups.lock().unwrap().insert(id, group.clone());
        Ok(id)
    }

    async fn update_group(&self, id: i64, group: &GroupPayload) -> Result<(), ApiError> {
        self.push(Call::UpdateGroup(id));
        self.groups.lock().unwrap().insert(id, group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: i64) -> Result<(), ApiError> {
        self.push(Call::DeleteGroup(id));
        self.check_delete()?;
        self.groups.lock().unwrap().remove(&id);
        Ok(())
    }

    async fn create_alert_channel(&self, _channel: &AlertChannelPayload) -> Result<i64, ApiError> {
        self.push(Call::CreateAlertChannel);
        self.check_create()?;
        Ok(self.next_id())
    }

    async fn update_alert_channel(
        &self,
        id: i64,
        _channel: &AlertChannelPayload,
    ) -> Result<(), ApiError> {
        self.push(Call::UpdateAlertChannel(id));
        Ok(())
    }

    async fn delete_alert_channel(&self, id: i64) -> Result<(), ApiError> {
        self.push(Call::DeleteAlertChannel(id));
        self.check_delete()?;
        Ok(())
    }
}

/// Store, event log and fake API wired together.
pub struct Harness {
    pub store: DynStore,
    pub log: Arc<InMemoryEventLog>,
    pub events: DynEventRecorder,
    pub api: Arc<FakeApi>,
    pub adapter: SyncAdapter,
    pub domain: ControllerDomain,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }

    pub fn with_store(store: DynStore) -> Self {
        let log = Arc::new(InMemoryEventLog::new());
        let api = FakeApi::new();
        Self {
            store,
            events: log.clone(),
            log,
            adapter: SyncAdapter::new(api.clone()),
            api,
            domain: ControllerDomain::default(),
        }
    }

    pub fn finalizer(&self) -> String {
        self.domain.finalizer()
    }

    /// Creates a group that already has an external id.
    pub async fn synced_group(&self, name: &str, id: i64) -> CheckGroup {
        let created = self
            .store
            .create_record(&CheckGroup {
                metadata: ObjectMeta::new(name),
                spec: GroupSpec::default(),
                status: GroupStatus::default(),
            })
            .await
            .unwrap();
        let mut synced = created;
        synced.status = GroupStatus { id };
        self.store.update_record_status(&synced).await.unwrap()
    }

    pub fn route(&self, name: &str, namespace: &str, annotations: &[(AnnotationKey, &str)]) -> Route {
        let mut metadata = ObjectMeta::namespaced(name, namespace);
        metadata.annotations = annotations
            .iter()
            .map(|(key, value)| (self.domain.annotation(*key), value.to_string()))
            .collect();
        Route {
            metadata,
            spec: RouteSpec::default(),
        }
    }
}

pub fn rule(host: &str, paths: &[&str]) -> RouteRule {
    RouteRule {
        host: host.to_string(),
        paths: (!paths.is_empty()).then(|| paths.iter().map(|p| p.to_string()).collect()),
    }
}

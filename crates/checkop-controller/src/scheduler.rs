//! Level-triggered work queue driving the reconcilers.
//!
//! Keys enter the queue from the store's change stream and from a periodic
//! full resync. A key is never processed by two workers at once: a key that
//! changes while it is being processed is queued again once the pass ends.
//!
//! Retry policy:
//! - retriable failures back off exponentially, up to `max_retries` attempts
//! - not-ready dependencies are retried after a fixed delay, up to
//!   `max_retries` attempts
//! - validation failures are not retried until the record changes
//!
//! Past the limit a warning event is recorded and the key is left to the
//! next resync. Every failure is attached to the record's recent events.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use checkop_checkly::SyncAdapter;
use checkop_core::{
    AlertChannel, CheckGroup, ControllerDomain, ManagedCheck, Record, RecordKey, RecordKind,
    SecretKeyRef,
};
use checkop_storage::{
    ChangeEvent, ChangeOp, DynEventRecorder, DynStore, LabelSelector, RecordEvent, StorageError,
    TypedRecordStore,
};
use tokio::sync::Notify;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alert_channels::AlertChannelReconciler;
use crate::checks::CheckReconciler;
use crate::dependency::DEFAULT_SECRET_NAMESPACE;
use crate::error::{ReconcileOutcome, ReconcileResult};
use crate::groups::GroupReconciler;
use crate::route::RouteReconciler;

/// Kinds the controller reconciles. Secrets are only read.
pub const RECONCILED_KINDS: [RecordKind; 4] = [
    RecordKind::AlertChannel,
    RecordKind::Group,
    RecordKind::ApiCheck,
    RecordKind::Route,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub workers: usize,
    pub resync_interval: Duration,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
    pub not_ready_delay: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            resync_interval: Duration::from_secs(300),
            max_retries: 10,
            retry_base: Duration::from_millis(500),
            retry_max: Duration::from_secs(60),
            not_ready_delay: Duration::from_secs(5),
        }
    }
}

impl SchedulerOptions {
    /// Delay before retry number `attempt`, starting at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base.saturating_mul(factor).min(self.retry_max)
    }
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<RecordKey>,
    queued: HashSet<RecordKey>,
    active: HashSet<RecordKey>,
    dirty: HashSet<RecordKey>,
}

/// FIFO of record keys with per-key de-duplication.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `key` unless it is already waiting. A key being processed is
    /// queued again when its pass ends.
    pub fn add(&self, key: RecordKey) {
        let mut state = self.lock();
        if state.active.contains(&key) {
            state.dirty.insert(key);
            return;
        }
        if state.queued.insert(key.clone()) {
            state.pending.push_back(key);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Queues `key` after `delay`, unless cancelled first.
    pub fn add_after(self: &Arc<Self>, key: RecordKey, delay: Duration, cancel: &CancellationToken) {
        let queue = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => queue.add(key),
            }
        });
    }

    /// Waits for the next key and marks it active.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<RecordKey> {
        loop {
            if let Some(key) = self.pop() {
                return Some(key);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = self.notify.notified() => {}
            }
        }
    }

    fn pop(&self) -> Option<RecordKey> {
        let mut state = self.lock();
        let key = state.pending.pop_front()?;
        state.queued.remove(&key);
        state.active.insert(key.clone());
        Some(key)
    }

    /// Marks the pass for `key` finished.
    pub fn done(&self, key: &RecordKey) {
        let requeue = {
            let mut state = self.lock();
            state.active.remove(key);
            state.dirty.remove(key)
        };
        if requeue {
            self.add(key.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes queued keys to the reconciler of their kind.
pub struct Controller {
    store: DynStore,
    events: DynEventRecorder,
    checks: CheckReconciler,
    groups: GroupReconciler,
    alert_channels: AlertChannelReconciler,
    routes: RouteReconciler,
    queue: Arc<WorkQueue>,
    attempts: Mutex<HashMap<RecordKey, u32>>,
    options: SchedulerOptions,
}

impl Controller {
    pub fn new(
        store: DynStore,
        events: DynEventRecorder,
        adapter: SyncAdapter,
        domain: &ControllerDomain,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            checks: CheckReconciler::new(store.clone(), events.clone(), adapter.clone(), domain),
            groups: GroupReconciler::new(store.clone(), events.clone(), adapter.clone(), domain),
            alert_channels: AlertChannelReconciler::new(
                store.clone(),
                events.clone(),
                adapter,
                domain,
            ),
            routes: RouteReconciler::new(store.clone(), events.clone(), domain),
            store,
            events,
            queue: Arc::new(WorkQueue::new()),
            attempts: Mutex::new(HashMap::new()),
            options,
        }
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn enqueue(&self, key: RecordKey) {
        self.queue.add(key);
    }

    /// Runs one reconciliation pass for `key`.
    pub async fn reconcile(&self, key: &RecordKey, cancel: &CancellationToken) -> ReconcileResult {
        let namespace = key.namespace();
        match key.kind {
            RecordKind::ApiCheck => self.checks.reconcile(namespace, &key.name, cancel).await,
            RecordKind::Group => self.groups.reconcile(&key.name, cancel).await,
            RecordKind::AlertChannel => self.alert_channels.reconcile(&key.name, cancel).await,
            RecordKind::Route => self.routes.reconcile(namespace, &key.name, cancel).await,
            RecordKind::Secret => Ok(ReconcileOutcome::Done),
        }
    }

    /// Runs one pass and returns the delay before `key` should run again.
    pub async fn process(&self, key: &RecordKey, cancel: &CancellationToken) -> Option<Duration> {
        let pass = cancel.child_token();
        match self.reconcile(key, &pass).await {
            Ok(ReconcileOutcome::Done) => {
                self.forget(key);
                None
            }
            Ok(ReconcileOutcome::NotReady { dependency }) => {
                let attempt = self.bump(key);
                if attempt > self.options.max_retries {
                    self.forget(key);
                    self.events.record(RecordEvent::warning(
                        key.clone(),
                        "DependencyNotReady",
                        format!(
                            "{dependency} has no external id after {} attempts",
                            attempt - 1
                        ),
                    ));
                    return None;
                }
                debug!(record = %key, dependency = %dependency, attempt, "Requeueing until dependency is ready");
                Some(self.options.not_ready_delay)
            }
            Err(err) if err.is_cancelled() && cancel.is_cancelled() => {
                debug!(record = %key, "Pass cancelled by shutdown");
                None
            }
            Err(err) => {
                warn!(record = %key, error = %err, "Reconciliation failed");
                self.events.record(RecordEvent::warning(
                    key.clone(),
                    err.reason(),
                    err.to_string(),
                ));
                if !err.is_retriable() {
                    self.forget(key);
                    return None;
                }
                let attempt = self.bump(key);
                if attempt > self.options.max_retries {
                    self.forget(key);
                    self.events.record(RecordEvent::warning(
                        key.clone(),
                        "RetriesExhausted",
                        format!("giving up after {} attempts until the next resync", attempt - 1),
                    ));
                    return None;
                }
                Some(self.options.backoff(attempt))
            }
        }
    }

    fn bump(&self, key: &RecordKey) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        let attempt = attempts.entry(key.clone()).or_insert(0);
        *attempt += 1;
        *attempt
    }

    fn forget(&self, key: &RecordKey) {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Queues every record of every reconciled kind.
    pub async fn resync(&self) -> Result<usize, StorageError> {
        let mut queued = 0;
        for kind in RECONCILED_KINDS {
            for stored in self.store.list(kind, None, &LabelSelector::everything()).await? {
                self.queue.add(stored.key);
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Queues the records affected by a change.
    ///
    /// Status writes come from the reconcilers themselves and do not queue
    /// the record again, but they do wake records waiting on it.
    pub async fn on_change(&self, event: &ChangeEvent) -> Result<(), StorageError> {
        let key = &event.key;
        if event.op != ChangeOp::StatusUpdated && key.kind != RecordKind::Secret {
            self.queue.add(key.clone());
        }

        match (key.kind, event.op) {
            (RecordKind::Group, ChangeOp::StatusUpdated) => {
                let checks = self
                    .store
                    .list_records::<ManagedCheck>(None, &LabelSelector::everything())
                    .await?;
                for check in checks.iter().filter(|c| c.spec.group == key.name) {
                    self.queue.add(check.key());
                }
            }
            (RecordKind::AlertChannel, ChangeOp::StatusUpdated) => {
                let groups = self
                    .store
                    .list_records::<CheckGroup>(None, &LabelSelector::everything())
                    .await?;
                for group in groups
                    .iter()
                    .filter(|g| g.spec.alert_channels.contains(&key.name))
                {
                    self.queue.add(group.key());
                }
            }
            (RecordKind::Secret, _) => {
                let channels = self
                    .store
                    .list_records::<AlertChannel>(None, &LabelSelector::everything())
                    .await?;
                for channel in channels.iter().filter(|c| references_secret(c, key)) {
                    self.queue.add(channel.key());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Runs workers, the change watch and the periodic resync until
    /// `cancel` fires.
    pub async fn run(
        self: Arc<Self>,
        changes: broadcast::Receiver<ChangeEvent>,
        cancel: CancellationToken,
    ) {
        info!(
            workers = self.options.workers,
            resync_secs = self.options.resync_interval.as_secs(),
            backend = self.store.backend_name(),
            "Controller started"
        );

        let mut tasks = JoinSet::new();
        for worker in 0..self.options.workers.max(1) {
            let controller = Arc::clone(&self);
            let cancel = cancel.clone();
            tasks.spawn(async move { controller.work(worker, cancel).await });
        }
        {
            let controller = Arc::clone(&self);
            let cancel = cancel.clone();
            tasks.spawn(async move { controller.watch(changes, cancel).await });
        }
        {
            let controller = Arc::clone(&self);
            let cancel = cancel.clone();
            tasks.spawn(async move { controller.resync_loop(cancel).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Controller task failed");
            }
        }
        info!("Controller stopped");
    }

    async fn work(&self, worker: usize, cancel: CancellationToken) {
        while let Some(key) = self.queue.next(&cancel).await {
            let requeue = self.process(&key, &cancel).await;
            self.queue.done(&key);
            if let Some(delay) = requeue {
                self.queue.add_after(key, delay, &cancel);
            }
        }
        debug!(worker, "Worker stopped");
    }

    async fn watch(&self, mut changes: broadcast::Receiver<ChangeEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = changes.recv() => event,
            };
            match event {
                Ok(event) => {
                    if let Err(e) = self.on_change(&event).await {
                        warn!(record = %event.key, error = %e, "Failed to queue dependents");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change stream lagged, resyncing");
                    if let Err(e) = self.resync().await {
                        warn!(error = %e, "Resync failed");
                    }
                }
                Err(RecvError::Closed) => {
                    debug!("Change stream closed");
                    break;
                }
            }
        }
    }

    async fn resync_loop(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.options.resync_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => match self.resync().await {
                    Ok(queued) => debug!(queued, "Resync queued records"),
                    Err(e) => warn!(error = %e, category = %e.category(), "Resync failed"),
                },
            }
        }
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("backend", &self.store.backend_name())
            .field("queued", &self.queue.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn references_secret(channel: &AlertChannel, secret: &RecordKey) -> bool {
    let matches = |reference: &SecretKeyRef| {
        reference.name == secret.name
            && reference
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(DEFAULT_SECRET_NAMESPACE)
                == secret.namespace().unwrap_or(DEFAULT_SECRET_NAMESPACE)
    };
    let spec = &channel.spec;
    spec.opsgenie
        .as_ref()
        .is_some_and(|opsgenie| matches(&opsgenie.api_secret))
        || spec
            .webhook
            .as_ref()
            .and_then(|webhook| webhook.webhook_secret.as_ref())
            .is_some_and(matches)
}

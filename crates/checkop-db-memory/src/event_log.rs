use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use checkop_core::RecordKey;
use checkop_storage::{EventRecorder, EventType, RecordEvent};

/// Number of events kept per record.
pub const DEFAULT_EVENTS_PER_RECORD: usize = 32;

/// Bounded per-record event history, mirrored to the tracing stream.
#[derive(Debug)]
pub struct InMemoryEventLog {
    events: Mutex<HashMap<RecordKey, VecDeque<RecordEvent>>>,
    capacity: usize,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENTS_PER_RECORD)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder for InMemoryEventLog {
    fn record(&self, event: RecordEvent) {
        match event.event_type {
            EventType::Normal => tracing::info!(
                record = %event.key,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                record = %event.key,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let history = events.entry(event.key.clone()).or_default();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(event);
    }

    fn recent(&self, key: &RecordKey) -> Vec<RecordEvent> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        events
            .get(key)
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

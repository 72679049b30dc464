//! Events emitted by the coordinator and the sinks that consume them.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::{ApplicationRecord, StopReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    Began { item_id: String, attempt_id: Uuid },
    Ended { record: ApplicationRecord },
    /// Recovery signal from the health check.
    TimedOut { item_id: String, elapsed_ms: u64 },
    /// `process_next` found the lock held and rescheduled itself.
    Deferred { delay_ms: u64 },
    ActionFailed { item_id: String, reason: String },
    PageAdvanced { page: u32 },
    Exhausted { processed: usize },
    LimitReached { limit: u32 },
    /// The runner left its loop; sent once per run.
    Stopped { reason: StopReason },
}

pub trait EventSink {
    fn emit(&self, event: &CoordinatorEvent);
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &CoordinatorEvent) {
        match event {
            CoordinatorEvent::Began {
                item_id,
                attempt_id,
            } => info!(%item_id, %attempt_id, "application started"),
            CoordinatorEvent::Ended { record } => match record.error() {
                None => info!(
                    item_id = %record.item_id,
                    attempt_id = %record.attempt_id,
                    duration_ms = record.duration_ms,
                    "application submitted"
                ),
                Some(err) => warn!(
                    attempt_id = %record.attempt_id,
                    duration_ms = record.duration_ms,
                    %err,
                    "application ended without success"
                ),
            },
            CoordinatorEvent::TimedOut {
                item_id,
                elapsed_ms,
            } => warn!(%item_id, elapsed_ms, "application timed out, lock released"),
            CoordinatorEvent::Deferred { delay_ms } => {
                info!(delay_ms, "application in progress, retrying later")
            }
            CoordinatorEvent::ActionFailed { item_id, reason } => {
                warn!(%item_id, %reason, "apply action failed")
            }
            CoordinatorEvent::PageAdvanced { page } => info!(page, "moving to next page"),
            CoordinatorEvent::Exhausted { processed } => {
                info!(processed, "no more items to process")
            }
            CoordinatorEvent::LimitReached { limit } => {
                info!(limit, "application limit reached")
            }
            CoordinatorEvent::Stopped { reason } => info!(%reason, "run stopped"),
        }
    }
}

/// Keeps every event in a shared buffer. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<CoordinatorEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CoordinatorEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&CoordinatorEvent) -> bool) -> usize {
        self.events().iter().filter(|&e| predicate(e)).count()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &CoordinatorEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards each event to several sinks, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl EventSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: &CoordinatorEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_clones_share_buffer() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        clone.emit(&CoordinatorEvent::PageAdvanced { page: 1 });
        assert_eq!(sink.events(), vec![CoordinatorEvent::PageAdvanced { page: 1 }]);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let fanout = FanoutSink::new().with(a.clone()).with(b.clone());
        fanout.emit(&CoordinatorEvent::Deferred { delay_ms: 10 });
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn count_filters_by_predicate() {
        let sink = MemorySink::new();
        sink.emit(&CoordinatorEvent::PageAdvanced { page: 1 });
        sink.emit(&CoordinatorEvent::PageAdvanced { page: 2 });
        sink.emit(&CoordinatorEvent::Exhausted { processed: 0 });
        assert_eq!(
            sink.count(|e| matches!(e, CoordinatorEvent::PageAdvanced { .. })),
            2
        );
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&CoordinatorEvent::LimitReached { limit: 3 }).unwrap();
        assert_eq!(json, r#"{"event":"limit_reached","limit":3}"#);
    }
}

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use super::record::ApplicationRecord;
use super::state::{CoordinatorState, Item, Outcome, Phase};
use crate::error::CoordinatorError;
use crate::events::{CoordinatorEvent, EventSink};

/// The application that currently holds the lock.
#[derive(Debug, Clone)]
struct Active {
    attempt_id: Uuid,
    item_id: String,
    started: Instant,
    started_at: DateTime<Utc>,
}

/// Single-flight coordinator: at most one application is IN_PROGRESS at a time.
///
/// The coordinator is an owned value passed by reference to whoever drives it.
/// It never sleeps or spawns; time only enters through [`check_health_at`]
/// and the instant captured by [`begin_application`].
///
/// [`check_health_at`]: Coordinator::check_health_at
/// [`begin_application`]: Coordinator::begin_application
pub struct Coordinator {
    state: CoordinatorState,
    timeout: Duration,
    active: Option<Active>,
    history: Vec<ApplicationRecord>,
    sink: Box<dyn EventSink>,
}

impl Coordinator {
    pub fn new(timeout: Duration, sink: Box<dyn EventSink>) -> Self {
        Self::with_state(CoordinatorState::default(), timeout, sink)
    }

    /// Resume from a persisted snapshot. Any in-flight bookkeeping it carries
    /// is dropped, so the coordinator always starts IDLE.
    pub fn with_state(state: CoordinatorState, timeout: Duration, sink: Box<dyn EventSink>) -> Self {
        Self {
            state: state.restored(),
            timeout,
            active: None,
            history: Vec::new(),
            sink,
        }
    }

    pub fn state(&self) -> &CoordinatorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_in_progress(&self) -> bool {
        self.state.in_progress
    }

    pub fn lock_held(&self) -> bool {
        self.state.lock_held
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn history(&self) -> &[ApplicationRecord] {
        &self.history
    }

    /// Time spent in the current application, if any.
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.active
            .as_ref()
            .map(|active| now.saturating_duration_since(active.started))
    }

    pub fn emit(&self, event: &CoordinatorEvent) {
        self.sink.emit(event);
    }

    /// IDLE → IN_PROGRESS. Acquires the lock and returns the new attempt id.
    pub fn begin_application(&mut self, item_id: &str) -> Result<Uuid, CoordinatorError> {
        if self.state.in_progress {
            return Err(CoordinatorError::AlreadyInProgress {
                item_id: self.state.current_item.clone().unwrap_or_default(),
            });
        }

        let active = Active {
            attempt_id: Uuid::new_v4(),
            item_id: item_id.to_string(),
            started: Instant::now(),
            started_at: Utc::now(),
        };
        let attempt_id = active.attempt_id;

        self.state.in_progress = true;
        self.state.lock_held = true;
        self.state.started_at = Some(active.started_at);
        self.state.current_item = Some(active.item_id.clone());
        self.active = Some(active);

        self.sink.emit(&CoordinatorEvent::Began {
            item_id: item_id.to_string(),
            attempt_id,
        });
        Ok(attempt_id)
    }

    /// IN_PROGRESS → IDLE. Releases the lock and records the outcome.
    pub fn end_application(&mut self, outcome: Outcome) -> Result<ApplicationRecord, CoordinatorError> {
        let active = self.active.take().ok_or(CoordinatorError::NotInProgress)?;

        self.state.in_progress = false;
        self.state.lock_held = false;
        self.state.started_at = None;
        self.state.current_item = None;

        let record =
            ApplicationRecord::new(active.attempt_id, active.item_id, outcome, active.started_at);
        self.history.push(record.clone());
        self.sink.emit(&CoordinatorEvent::Ended {
            record: record.clone(),
        });
        Ok(record)
    }

    pub fn check_health(&mut self) -> Option<ApplicationRecord> {
        self.check_health_at(Instant::now())
    }

    /// Forces a stuck application back to IDLE.
    ///
    /// Returns the timeout record when the running application has exceeded
    /// the timeout; `None` when idle or still within budget. The `TimedOut`
    /// signal is emitted once per stuck application since the forced end
    /// leaves nothing for a later check to find.
    pub fn check_health_at(&mut self, now: Instant) -> Option<ApplicationRecord> {
        let elapsed = self.elapsed_at(now)?;
        if elapsed <= self.timeout {
            return None;
        }

        let item_id = self.state.current_item.clone().unwrap_or_default();
        self.sink.emit(&CoordinatorEvent::TimedOut {
            item_id,
            elapsed_ms: elapsed.as_millis() as u64,
        });
        self.end_application(Outcome::Timeout).ok()
    }

    /// First item of `items` that has not been processed yet.
    pub fn select_next<'a>(&self, items: &'a [Item]) -> Option<&'a Item> {
        items.iter().find(|item| !self.state.is_processed(&item.id))
    }

    /// Returns `false` when the id was already processed.
    pub fn mark_processed(&mut self, item_id: &str) -> bool {
        self.state.processed_ids.insert(item_id.to_string())
    }

    /// Moves the pagination cursor forward and returns the new page number.
    pub fn advance_page(&mut self) -> u32 {
        self.state.current_page += 1;
        self.sink.emit(&CoordinatorEvent::PageAdvanced {
            page: self.state.current_page,
        });
        self.state.current_page
    }

    /// Records that the last page has been walked. Returns `true` the first time.
    pub fn mark_exhausted(&mut self) -> bool {
        if self.state.no_more_pages {
            return false;
        }
        self.state.no_more_pages = true;
        self.sink.emit(&CoordinatorEvent::Exhausted {
            processed: self.state.processed_ids.len(),
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;

    fn make_coordinator(timeout: Duration) -> (Coordinator, MemorySink) {
        let sink = MemorySink::new();
        (Coordinator::new(timeout, Box::new(sink.clone())), sink)
    }

    #[test]
    fn begin_then_end_walks_idle_in_progress_idle() {
        let (mut c, sink) = make_coordinator(Duration::from_secs(60));
        assert_eq!(c.phase(), Phase::Idle);

        let attempt = c.begin_application("job-1").unwrap();
        assert_eq!(c.phase(), Phase::InProgress);
        assert!(c.lock_held());
        assert!(c.state().started_at.is_some());
        assert_eq!(c.state().current_item.as_deref(), Some("job-1"));

        let record = c.end_application(Outcome::Success).unwrap();
        assert_eq!(record.attempt_id, attempt);
        assert_eq!(record.item_id, "job-1");
        assert_eq!(c.phase(), Phase::Idle);
        assert!(!c.lock_held());
        assert!(c.state().started_at.is_none());

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], CoordinatorEvent::Began { .. }));
        assert!(matches!(events[1], CoordinatorEvent::Ended { .. }));
    }

    #[test]
    fn second_begin_is_rejected() {
        let (mut c, _) = make_coordinator(Duration::from_secs(60));
        c.begin_application("job-1").unwrap();

        let err = c.begin_application("job-2").unwrap_err();
        assert_eq!(
            err,
            CoordinatorError::AlreadyInProgress {
                item_id: "job-1".into()
            }
        );
        assert_eq!(c.state().current_item.as_deref(), Some("job-1"));
    }

    #[test]
    fn end_without_begin_is_rejected() {
        let (mut c, sink) = make_coordinator(Duration::from_secs(60));
        assert_eq!(
            c.end_application(Outcome::Success).unwrap_err(),
            CoordinatorError::NotInProgress
        );
        assert!(sink.events().is_empty());
        assert!(c.history().is_empty());
    }

    #[test]
    fn in_progress_tracks_matching_begin_end_pairs() {
        let (mut c, _) = make_coordinator(Duration::from_secs(60));
        // Unmatched ends and duplicate begins interleaved with real pairs.
        let script: &[(&str, bool)] = &[
            ("end", false),
            ("begin", true),
            ("begin", true),
            ("end", false),
            ("end", false),
            ("begin", true),
            ("end", false),
        ];
        for (op, expected) in script {
            match *op {
                "begin" => {
                    let _ = c.begin_application("job");
                }
                _ => {
                    let _ = c.end_application(Outcome::from_success(false));
                }
            }
            assert_eq!(c.is_in_progress(), *expected, "after {op}");
            assert_eq!(c.lock_held(), *expected, "lock after {op}");
        }
        assert_eq!(c.history().len(), 2);
    }

    #[test]
    fn health_check_within_budget_does_nothing() {
        let (mut c, sink) = make_coordinator(Duration::from_secs(60));
        c.begin_application("job-1").unwrap();
        assert!(c.check_health_at(Instant::now() + Duration::from_secs(59)).is_none());
        assert!(c.is_in_progress());
        assert_eq!(sink.count(|e| matches!(e, CoordinatorEvent::TimedOut { .. })), 0);
    }

    #[test]
    fn health_check_forces_timeout_exactly_once() {
        let (mut c, sink) = make_coordinator(Duration::from_secs(60));
        c.begin_application("job-1").unwrap();

        let later = Instant::now() + Duration::from_secs(61);
        let record = c.check_health_at(later).unwrap();
        assert_eq!(record.outcome, Outcome::Timeout);
        assert_eq!(c.phase(), Phase::Idle);
        assert!(!c.lock_held());

        // Further checks find nothing to recover.
        assert!(c.check_health_at(later + Duration::from_secs(120)).is_none());
        assert_eq!(sink.count(|e| matches!(e, CoordinatorEvent::TimedOut { .. })), 1);
    }

    #[test]
    fn health_check_when_idle_is_noop() {
        let (mut c, sink) = make_coordinator(Duration::from_millis(1));
        assert!(c.check_health().is_none());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn processed_ids_grow_without_duplicates() {
        let (mut c, _) = make_coordinator(Duration::from_secs(60));
        assert!(c.mark_processed("a"));
        assert!(c.mark_processed("b"));
        assert!(!c.mark_processed("a"));
        assert_eq!(c.state().processed_ids.len(), 2);

        // Ending an application never removes entries.
        c.begin_application("c").unwrap();
        c.mark_processed("c");
        c.end_application(Outcome::Timeout).unwrap();
        assert_eq!(
            c.state().processed_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
    }

    #[test]
    fn select_next_skips_processed_items() {
        let (mut c, _) = make_coordinator(Duration::from_secs(60));
        let items = vec![Item::new("a"), Item::new("b"), Item::new("c")];
        c.mark_processed("a");
        assert_eq!(c.select_next(&items).map(|i| i.id.as_str()), Some("b"));
        c.mark_processed("b");
        c.mark_processed("c");
        assert!(c.select_next(&items).is_none());
    }

    #[test]
    fn exhausted_is_reported_once() {
        let (mut c, sink) = make_coordinator(Duration::from_secs(60));
        assert_eq!(c.advance_page(), 1);
        assert!(c.mark_exhausted());
        assert!(!c.mark_exhausted());
        assert!(c.state().no_more_pages);
        assert_eq!(sink.count(|e| matches!(e, CoordinatorEvent::Exhausted { .. })), 1);
    }

    #[test]
    fn restored_snapshot_starts_idle() {
        let mut snapshot = CoordinatorState {
            in_progress: true,
            lock_held: true,
            current_item: Some("x".into()),
            ..Default::default()
        };
        snapshot.processed_ids.insert("x".into());
        let c = Coordinator::with_state(snapshot, Duration::from_secs(1), Box::new(MemorySink::new()));
        assert_eq!(c.phase(), Phase::Idle);
        assert!(!c.lock_held());
        assert!(c.state().is_processed("x"));
    }
}

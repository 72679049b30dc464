//! Timer queue that replaces ad-hoc `setTimeout` chains.
//!
//! Every pending wake-up is an entry with a deadline and a [`Task`]; entries
//! can be cancelled by [`TimerId`]. The queue itself never sleeps: the runner
//! asks for [`Scheduler::next_deadline`], waits on it, then drains due tasks
//! with [`Scheduler::pop_due`].

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use tokio::time::Instant;

// Roughly thirty years; stands in for "never" when a delay overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    /// Pick the next unprocessed item and start applying.
    ProcessNext,
    /// Recover an application that has exceeded its timeout.
    HealthCheck,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    // (deadline, insertion sequence) orders the heap; ties resolve FIFO.
    queue: BinaryHeap<Reverse<(Instant, u64, TimerId, Task)>>,
    pending: HashSet<TimerId>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_at(&mut self, at: Instant, task: Task) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = TimerId(seq);
        self.queue.push(Reverse((at, seq, id, task)));
        self.pending.insert(id);
        id
    }

    pub fn schedule_in(&mut self, delay: Duration, task: Task) -> TimerId {
        let now = Instant::now();
        let at = now
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.schedule_at(at, task)
    }

    /// Returns `true` if the timer was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.pending.remove(&id)
    }

    /// Cancels every pending timer for `task`. Returns how many were cancelled.
    pub fn cancel_task(&mut self, task: Task) -> usize {
        let ids: Vec<TimerId> = self
            .queue
            .iter()
            .filter(|Reverse((_, _, id, t))| *t == task && self.pending.contains(id))
            .map(|Reverse((_, _, id, _))| *id)
            .collect();
        for id in &ids {
            self.pending.remove(id);
        }
        ids.len()
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.queue
            .iter()
            .any(|Reverse((_, _, id, t))| *t == task && self.pending.contains(id))
    }

    /// Earliest deadline among live timers.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_cancelled_head();
        self.queue.peek().map(|Reverse((at, ..))| *at)
    }

    /// Removes and returns the earliest live timer due at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<(TimerId, Task)> {
        self.discard_cancelled_head();
        let Reverse((at, ..)) = self.queue.peek()?;
        if *at > now {
            return None;
        }
        let Reverse((_, _, id, task)) = self.queue.pop()?;
        self.pending.remove(&id);
        Some((id, task))
    }

    fn discard_cancelled_head(&mut self) {
        while let Some(Reverse((_, _, id, _))) = self.queue.peek() {
            if self.pending.contains(id) {
                break;
            }
            self.queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_deadline_order() {
        let mut s = Scheduler::new();
        let base = Instant::now();
        s.schedule_at(base + Duration::from_secs(3), Task::HealthCheck);
        s.schedule_at(base + Duration::from_secs(1), Task::ProcessNext);

        let later = base + Duration::from_secs(10);
        assert_eq!(s.pop_due(later).map(|(_, t)| t), Some(Task::ProcessNext));
        assert_eq!(s.pop_due(later).map(|(_, t)| t), Some(Task::HealthCheck));
        assert!(s.pop_due(later).is_none());
        assert_eq!(s.next_deadline(), None);
    }

    #[test]
    fn equal_deadlines_are_fifo() {
        let mut s = Scheduler::new();
        let at = Instant::now();
        let first = s.schedule_at(at, Task::HealthCheck);
        let second = s.schedule_at(at, Task::ProcessNext);
        assert_eq!(s.pop_due(at), Some((first, Task::HealthCheck)));
        assert_eq!(s.pop_due(at), Some((second, Task::ProcessNext)));
    }

    #[test]
    fn nothing_due_before_deadline() {
        let mut s = Scheduler::new();
        let base = Instant::now();
        s.schedule_at(base + Duration::from_secs(5), Task::ProcessNext);
        assert!(s.pop_due(base).is_none());
        assert_eq!(s.next_deadline(), Some(base + Duration::from_secs(5)));
        assert!(s.is_scheduled(Task::ProcessNext));
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let mut s = Scheduler::new();
        let base = Instant::now();
        let early = s.schedule_at(base + Duration::from_secs(1), Task::ProcessNext);
        s.schedule_at(base + Duration::from_secs(2), Task::HealthCheck);

        assert!(s.cancel(early));
        assert!(!s.cancel(early));
        assert_eq!(s.next_deadline(), Some(base + Duration::from_secs(2)));
        assert_eq!(
            s.pop_due(base + Duration::from_secs(5)).map(|(_, t)| t),
            Some(Task::HealthCheck)
        );
        assert!(s.pop_due(base + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn cancel_task_removes_all_matching() {
        let mut s = Scheduler::new();
        s.schedule_in(Duration::from_secs(1), Task::ProcessNext);
        s.schedule_in(Duration::from_secs(2), Task::ProcessNext);
        s.schedule_in(Duration::from_secs(3), Task::HealthCheck);

        assert!(s.is_scheduled(Task::ProcessNext));
        assert_eq!(s.cancel_task(Task::ProcessNext), 2);
        assert!(!s.is_scheduled(Task::ProcessNext));
        assert!(s.is_scheduled(Task::HealthCheck));
    }

    #[test]
    fn overflowing_delay_is_pushed_far_out() {
        let mut s = Scheduler::new();
        let before = Instant::now();
        s.schedule_in(Duration::from_millis(u64::MAX), Task::ProcessNext);

        let deadline = s.next_deadline().unwrap();
        assert!(deadline >= before + FAR_FUTURE);
        assert!(s.pop_due(before + Duration::from_secs(86_400)).is_none());
    }
}

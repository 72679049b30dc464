use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::Outcome;
use crate::error::CoordinatorError;

/// Audit record produced when an application leaves IN_PROGRESS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub attempt_id: Uuid,
    pub item_id: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl ApplicationRecord {
    pub fn new(
        attempt_id: Uuid,
        item_id: String,
        outcome: Outcome,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        Self {
            attempt_id,
            item_id,
            outcome,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds(),
        }
    }

    /// The error a non-successful outcome corresponds to, if any.
    pub fn error(&self) -> Option<CoordinatorError> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(CoordinatorError::ActionFailed {
                item_id: self.item_id.clone(),
                reason: reason.clone(),
            }),
            Outcome::Timeout => Some(CoordinatorError::Timeout {
                item_id: self.item_id.clone(),
                elapsed_ms: self.duration_ms.max(0) as u64,
            }),
        }
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every page was walked and no unprocessed item remains.
    Exhausted,
    /// The configured application limit was reached.
    LimitReached,
    /// The run was interrupted from outside.
    Shutdown,
    /// The item source could not return a page.
    SourceFailed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Exhausted => write!(f, "no more items"),
            StopReason::LimitReached => write!(f, "application limit reached"),
            StopReason::Shutdown => write!(f, "interrupted"),
            StopReason::SourceFailed => write!(f, "job listing unavailable"),
        }
    }
}

/// Totals for one run, printed by the CLI at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub processed: usize,
    pub pages_visited: u32,
    pub stop_reason: StopReason,
}

impl RunSummary {
    pub fn from_records(
        records: &[ApplicationRecord],
        processed: usize,
        pages_visited: u32,
        stop_reason: StopReason,
    ) -> Self {
        let mut summary = Self {
            succeeded: 0,
            failed: 0,
            timed_out: 0,
            processed,
            pages_visited,
            stop_reason,
        };
        for record in records {
            match record.outcome {
                Outcome::Success => summary.succeeded += 1,
                Outcome::Failure(_) => summary.failed += 1,
                Outcome::Timeout => summary.timed_out += 1,
            }
        }
        summary
    }

    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed + self.timed_out
    }
}

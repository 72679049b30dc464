use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate job posting supplied by an [`ItemSource`](crate::source::ItemSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: None,
            title: None,
            company: None,
        }
    }
}

/// One page of candidates, as returned by a pagination cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub items: Vec<Item>,
    pub has_more: bool,
}

/// The two resting phases of the coordinator.
///
/// An application flows IDLE → IN_PROGRESS → (SUCCESS | FAILURE | TIMEOUT) → IDLE.
/// The terminal outcomes are not phases of their own; they are recorded as an
/// [`Outcome`] and the coordinator is IDLE again immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    InProgress,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "IDLE"),
            Phase::InProgress => write!(f, "IN_PROGRESS"),
        }
    }
}

/// How an application ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure(String),
    Timeout,
}

impl Outcome {
    /// Maps a bare success flag onto an outcome.
    pub fn from_success(success: bool) -> Self {
        if success {
            Outcome::Success
        } else {
            Outcome::Failure("application reported failure".into())
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "SUCCESS"),
            Outcome::Failure(reason) => write!(f, "FAILURE: {reason}"),
            Outcome::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// Bookkeeping shared by every per-site automation.
///
/// `processed_ids` only ever grows. `lock_held` is released on every exit
/// path out of IN_PROGRESS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub in_progress: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub lock_held: bool,
    #[serde(default)]
    pub current_item: Option<String>,
    #[serde(default)]
    pub processed_ids: BTreeSet<String>,
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub no_more_pages: bool,
}

impl CoordinatorState {
    pub fn phase(&self) -> Phase {
        if self.in_progress {
            Phase::InProgress
        } else {
            Phase::Idle
        }
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed_ids.contains(id)
    }

    /// Resets the in-flight bookkeeping of a loaded snapshot.
    ///
    /// A snapshot never carries a live application across runs: the lock is
    /// released and the page walk restarts from the saved cursor.
    pub fn restored(mut self) -> Self {
        self.in_progress = false;
        self.started_at = None;
        self.lock_held = false;
        self.current_item = None;
        self.no_more_pages = false;
        self
    }
}

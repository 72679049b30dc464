//! The "perform the application" callback the runner drives.
//!
//! Implementations own all site-specific work. The runner only sees whether
//! the future resolved `Ok`, resolved `Err`, or never resolved in time.

use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use crate::backend::BackendError;
use crate::coordinator::Item;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Failed(String),
}

#[allow(async_fn_in_trait)]
pub trait ApplyAction {
    /// Submits one application. Dropping the returned future cancels it.
    async fn apply(&self, item: Item) -> Result<(), ActionError>;

    /// Called after a timeout to undo whatever the cancelled attempt left
    /// behind (open dialogs, half-filled forms).
    async fn cleanup(&self, _item_id: &str) {}
}

/// What [`SimulatedAction`] does for a given item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Simulated {
    Succeed,
    Fail,
    /// Never resolves; only the health check gets the coordinator out.
    Hang,
}

/// Stand-in action for dry runs and the demo.
#[derive(Debug, Default)]
pub struct SimulatedAction {
    delay: Duration,
    script: HashMap<String, Simulated>,
    cleaned_up: RefCell<Vec<String>>,
}

impl SimulatedAction {
    /// Every application succeeds after `delay`.
    pub fn succeeding(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn with(mut self, item_id: impl Into<String>, behaviour: Simulated) -> Self {
        self.script.insert(item_id.into(), behaviour);
        self
    }

    /// Ids passed to `cleanup`, in call order.
    pub fn cleaned_up(&self) -> Vec<String> {
        self.cleaned_up.borrow().clone()
    }
}

impl ApplyAction for SimulatedAction {
    async fn apply(&self, item: Item) -> Result<(), ActionError> {
        tokio::time::sleep(self.delay).await;
        match self.script.get(&item.id).copied().unwrap_or(Simulated::Succeed) {
            Simulated::Succeed => Ok(()),
            Simulated::Fail => Err(ActionError::Failed(format!(
                "simulated failure for {}",
                item.id
            ))),
            Simulated::Hang => std::future::pending().await,
        }
    }

    async fn cleanup(&self, item_id: &str) {
        info!(%item_id, "closing leftover application dialogs");
        self.cleaned_up.borrow_mut().push(item_id.to_string());
    }
}

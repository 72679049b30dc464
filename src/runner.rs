//! Drives a [`Coordinator`] over an [`ItemSource`] with an [`ApplyAction`].
//!
//! Everything runs on one task. The loop waits on whichever comes first: the
//! in-flight application, the next scheduler deadline, or shutdown. A forced
//! timeout drops the in-flight future, which cancels it, and then awaits the
//! action's cleanup hook.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::action::{ActionError, ApplyAction};
use crate::backend::BackendError;
use crate::config::AutoApplyConfig;
use crate::coordinator::{Coordinator, Outcome, Page, RunSummary, StopReason};
use crate::error::SourceError;
use crate::events::CoordinatorEvent;
use crate::scheduler::{Scheduler, Task};
use crate::source::ItemSource;
use crate::store::StateStore;

const MIN_RETRY_DELAY: Duration = Duration::from_millis(1);

type ApplyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ActionError>> + 'a>>;

/// Timer settings for a run.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub health_check_interval: Duration,
    pub busy_retry_delay: Duration,
    pub next_application_delay: Duration,
    pub application_limit: Option<u32>,
}

impl From<&AutoApplyConfig> for RunnerSettings {
    fn from(config: &AutoApplyConfig) -> Self {
        Self {
            health_check_interval: config.health_check_interval(),
            busy_retry_delay: config.busy_retry_delay(),
            next_application_delay: config.next_application_delay(),
            application_limit: config.application_limit,
        }
    }
}

/// Result of one `process_next` tick.
pub enum Step<'a> {
    /// An application began; the future completes it.
    Started(ApplyFuture<'a>),
    /// The lock was held; another tick is scheduled.
    Deferred,
    Stop(StopReason),
}

/// Coordinator plus the bookkeeping around it that does not borrow the
/// source or the action.
pub struct Session {
    coordinator: Coordinator,
    scheduler: Scheduler,
    settings: RunnerSettings,
    store: Option<StateStore>,
    page: Option<Page>,
    started: u32,
    pages_visited: u32,
}

impl Session {
    pub fn new(coordinator: Coordinator, settings: RunnerSettings) -> Self {
        Self {
            coordinator,
            scheduler: Scheduler::new(),
            settings,
            store: None,
            page: None,
            started: 0,
            pages_visited: 0,
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Selects the next unprocessed item and starts applying to it.
    ///
    /// Never starts a second application while the lock is held: in that
    /// case it reschedules itself after `busy_retry_delay` and returns
    /// [`Step::Deferred`].
    pub async fn process_next<'a, S: ItemSource, A: ApplyAction>(
        &mut self,
        source: &S,
        action: &'a A,
    ) -> Result<Step<'a>, SourceError> {
        if self.coordinator.lock_held() {
            // A zero delay would make the tick due again inside the same drain.
            let delay = self.settings.busy_retry_delay.max(MIN_RETRY_DELAY);
            self.coordinator.emit(&CoordinatorEvent::Deferred {
                delay_ms: delay.as_millis() as u64,
            });
            self.scheduler.schedule_in(delay, Task::ProcessNext);
            return Ok(Step::Deferred);
        }

        if let Some(limit) = self.settings.application_limit
            && self.started >= limit
        {
            self.coordinator.emit(&CoordinatorEvent::LimitReached { limit });
            return Ok(Step::Stop(StopReason::LimitReached));
        }

        loop {
            let page = match self.page.take() {
                Some(page) => page,
                None => {
                    if self.coordinator.state().no_more_pages {
                        return Ok(Step::Stop(StopReason::Exhausted));
                    }
                    let number = self.coordinator.state().current_page;
                    debug!(page = number, "fetching page");
                    let page = source.page(number).await?;
                    if !page.items.is_empty() {
                        self.pages_visited += 1;
                    }
                    page
                }
            };

            if let Some(item) = self.coordinator.select_next(&page.items).cloned() {
                self.page = Some(page);
                if let Err(err) = self.coordinator.begin_application(&item.id) {
                    warn!(%err, "could not begin application");
                    self.scheduler.schedule_in(
                        self.settings.busy_retry_delay.max(MIN_RETRY_DELAY),
                        Task::ProcessNext,
                    );
                    return Ok(Step::Deferred);
                }
                self.coordinator.mark_processed(&item.id);
                self.started += 1;
                return Ok(Step::Started(Box::pin(action.apply(item))));
            }

            if page.has_more {
                self.coordinator.advance_page();
                self.persist();
                continue;
            }

            self.coordinator.mark_exhausted();
            self.persist();
            return Ok(Step::Stop(StopReason::Exhausted));
        }
    }

    /// Records the outcome of a completed apply future and queues the next tick.
    fn finish(&mut self, result: Result<(), ActionError>) {
        let mut delay = self.settings.next_application_delay;
        let outcome = match result {
            Ok(()) => Outcome::Success,
            Err(err) => {
                if let ActionError::Backend(BackendError::RateLimited { retry_after_ms }) = &err {
                    delay = delay.max(Duration::from_millis(*retry_after_ms));
                }
                let item_id = self.coordinator.state().current_item.clone().unwrap_or_default();
                self.coordinator.emit(&CoordinatorEvent::ActionFailed {
                    item_id,
                    reason: err.to_string(),
                });
                Outcome::Failure(err.to_string())
            }
        };

        if let Err(err) = self.coordinator.end_application(outcome) {
            warn!(%err, "apply future completed while idle");
        }
        self.persist();
        self.schedule_next(delay);
    }

    fn schedule_next(&mut self, delay: Duration) {
        self.scheduler.cancel_task(Task::ProcessNext);
        self.scheduler.schedule_in(delay, Task::ProcessNext);
    }

    fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(err) = store.save(self.coordinator.state())
        {
            warn!(path = %store.path().display(), %err, "failed to save coordinator snapshot");
        }
    }

    pub fn summary(&self, stop_reason: StopReason) -> RunSummary {
        let state = self.coordinator.state();
        RunSummary::from_records(
            self.coordinator.history(),
            state.processed_ids.len(),
            self.pages_visited,
            stop_reason,
        )
    }
}

/// Owns a [`Session`], the item source and the apply action for one run.
pub struct Runner<S, A> {
    session: Session,
    source: S,
    action: A,
}

impl<S: ItemSource, A: ApplyAction> Runner<S, A> {
    pub fn new(coordinator: Coordinator, source: S, action: A, settings: RunnerSettings) -> Self {
        Self {
            session: Session::new(coordinator, settings),
            source,
            action,
        }
    }

    /// Snapshots are saved to `store` after every outcome and page change.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.session.store = Some(store);
        self
    }

    pub fn coordinator(&self) -> &Coordinator {
        self.session.coordinator()
    }

    pub fn action(&self) -> &A {
        &self.action
    }

    /// Queues an extra `process_next` tick right away, as an external
    /// "apply next" trigger would.
    pub fn request_next(&mut self) {
        self.session.scheduler.schedule_in(Duration::ZERO, Task::ProcessNext);
    }

    pub async fn run(&mut self) -> RunSummary {
        self.run_until(std::future::pending()).await
    }

    /// Runs until the source is exhausted, the application limit is hit,
    /// the source fails, or `shutdown` resolves.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> RunSummary {
        let Runner {
            session,
            source,
            action,
        } = self;
        let source: &S = source;
        let action: &A = action;
        let mut in_flight: Option<ApplyFuture<'_>> = None;
        tokio::pin!(shutdown);

        session.scheduler.schedule_in(Duration::ZERO, Task::ProcessNext);
        session
            .scheduler
            .schedule_in(session.settings.health_check_interval, Task::HealthCheck);

        let stop = 'run: loop {
            let deadline = session.scheduler.next_deadline();
            tokio::select! {
                biased;

                _ = &mut shutdown => break 'run StopReason::Shutdown,

                result = wait_in_flight(&mut in_flight) => {
                    in_flight = None;
                    session.finish(result);
                }

                _ = wait_deadline(deadline) => {
                    let now = Instant::now();
                    while let Some((_, task)) = session.scheduler.pop_due(now) {
                        match task {
                            Task::HealthCheck => {
                                if let Some(record) = session.coordinator.check_health_at(now) {
                                    in_flight = None;
                                    action.cleanup(&record.item_id).await;
                                    session.persist();
                                    session.schedule_next(session.settings.next_application_delay);
                                }
                                session
                                    .scheduler
                                    .schedule_in(session.settings.health_check_interval, Task::HealthCheck);
                            }
                            Task::ProcessNext => match session.process_next(source, action).await {
                                Ok(Step::Started(fut)) => in_flight = Some(fut),
                                Ok(Step::Deferred) => {}
                                Ok(Step::Stop(reason)) => break 'run reason,
                                Err(err) => {
                                    warn!(
                                        page = session.coordinator.state().current_page,
                                        %err,
                                        "could not fetch job listing"
                                    );
                                    break 'run StopReason::SourceFailed;
                                }
                            },
                        }
                    }
                }
            }
        };

        // Interrupted mid-application: release the lock but leave the
        // snapshot untouched so the item is retried on the next run.
        if in_flight.take().is_some() {
            let item_id = session.coordinator.state().current_item.clone().unwrap_or_default();
            if let Err(err) = session
                .coordinator
                .end_application(Outcome::Failure("interrupted".into()))
            {
                warn!(%err, "in-flight application without a lock");
            }
            action.cleanup(&item_id).await;
        }

        session.scheduler.cancel_task(Task::ProcessNext);
        session.scheduler.cancel_task(Task::HealthCheck);
        session.coordinator.emit(&CoordinatorEvent::Stopped { reason: stop });
        let summary = session.summary(stop);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out,
            reason = %stop,
            "run finished"
        );
        summary
    }
}

async fn wait_in_flight(in_flight: &mut Option<ApplyFuture<'_>>) -> Result<(), ActionError> {
    match in_flight.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

//! Drives one search task against one session.
//!
//! ```text
//! Idle -> Searching -> WaitingForResults -> Revealing -> ProcessingEntry(i) -> Completed
//!                            |                                  |
//!                            +-> Failed(no_results)             +-> Failed(too_many_failures)
//! ```
//!
//! A fatal session error at any point restarts the session and retries the
//! whole task, up to `max_attempts`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::document::HtmlDocument;
use super::maps::MapsLayout;
use super::pool::SessionSlot;
use super::traits::Session;
use super::types::{jitter, SearchParams};
use crate::dedup::ResultCollection;
use crate::error::{ExtractionError, SessionError};
use crate::extract::FieldExtractor;
use crate::models::SearchTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// No result entry appeared before the wait timed out
    NoResults,
    /// Too many entries in a row could not be processed
    TooManyFailures,
    /// Entries were found but none could be extracted
    AllEntriesFailed,
    /// Every attempt ended in a session error
    RetriesExhausted,
    /// The task ran past its time budget
    Timeout,
    /// The run was interrupted
    Cancelled,
    /// No search URL could be built for the task
    InvalidSearch,
}

impl FailureReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureReason::NoResults => "no_results",
            FailureReason::TooManyFailures => "too_many_failures",
            FailureReason::AllEntriesFailed => "all_entries_failed",
            FailureReason::RetriesExhausted => "retries_exhausted",
            FailureReason::Timeout => "timeout",
            FailureReason::Cancelled => "cancelled",
            FailureReason::InvalidSearch => "invalid_search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Idle,
    Searching,
    WaitingForResults,
    Revealing,
    ProcessingEntry(usize),
    Completed,
    Failed(FailureReason),
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed(_))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Idle => write!(f, "idle"),
            TaskState::Searching => write!(f, "searching"),
            TaskState::WaitingForResults => write!(f, "waiting_for_results"),
            TaskState::Revealing => write!(f, "revealing"),
            TaskState::ProcessingEntry(i) => write!(f, "processing_entry({})", i),
            TaskState::Completed => write!(f, "completed"),
            TaskState::Failed(reason) => write!(f, "failed({})", reason.as_str()),
        }
    }
}

/// What a task contributed to the run.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: SearchTask,
    pub state: TaskState,
    pub attempts: u32,
    pub entries_found: usize,
    pub entries_processed: usize,
    pub entry_failures: usize,
    pub new_records: usize,
    pub duplicates: usize,
    pub last_error: Option<String>,
    pub elapsed: Duration,
}

impl TaskOutcome {
    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    pub fn failure(&self) -> Option<FailureReason> {
        match self.state {
            TaskState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct TaskStats {
    attempts: u32,
    entries_found: usize,
    entries_processed: usize,
    entry_failures: usize,
    new_records: usize,
    duplicates: usize,
    last_error: Option<String>,
}

#[derive(Debug, Error)]
enum EntryError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

enum EntryOutcome {
    Added(String),
    Duplicate(String),
    /// The list no longer holds this many entries.
    Gone,
}

/// Poll `probe` until it yields a value or `timeout` elapses.
async fn wait_until<T, F, Fut>(
    timeout: Duration,
    poll: Duration,
    mut probe: F,
) -> Result<Option<T>, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, SessionError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await? {
            return Ok(Some(value));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        sleep(poll).await;
    }
}

pub struct SearchOrchestrator {
    layout: MapsLayout,
    extractor: FieldExtractor,
    params: SearchParams,
    results: ResultCollection,
}

impl SearchOrchestrator {
    pub fn new(
        layout: MapsLayout,
        extractor: FieldExtractor,
        params: SearchParams,
        results: ResultCollection,
    ) -> Arc<Self> {
        Arc::new(Self {
            layout,
            extractor,
            params,
            results,
        })
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn results(&self) -> &ResultCollection {
        &self.results
    }

    /// Run `task` on `slot` until it completes, fails, times out or `cancel` fires.
    pub async fn run_task(
        &self,
        slot: &mut SessionSlot,
        task: &SearchTask,
        cancel: &CancellationToken,
    ) -> TaskOutcome {
        let started = std::time::Instant::now();
        let mut stats = TaskStats::default();
        self.enter(task, TaskState::Idle);

        let state = {
            let work = self.run_attempts(slot, task, &mut stats);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => TaskState::Failed(FailureReason::Cancelled),
                result = tokio::time::timeout(self.params.task_timeout, work) => match result {
                    Ok(state) => state,
                    Err(_) => TaskState::Failed(FailureReason::Timeout),
                },
            }
        };

        match state {
            TaskState::Completed => info!(
                query = %task.query,
                area = %task.area,
                "Finished {}: {} new record(s), {} duplicate(s), {} entry failure(s)",
                task, stats.new_records, stats.duplicates, stats.entry_failures
            ),
            _ => warn!(query = %task.query, area = %task.area, attempts = stats.attempts, "Search {} ended {}", task, state),
        }

        TaskOutcome {
            task: task.clone(),
            state,
            attempts: stats.attempts,
            entries_found: stats.entries_found,
            entries_processed: stats.entries_processed,
            entry_failures: stats.entry_failures,
            new_records: stats.new_records,
            duplicates: stats.duplicates,
            last_error: stats.last_error,
            elapsed: started.elapsed(),
        }
    }

    async fn run_attempts(
        &self,
        slot: &mut SessionSlot,
        task: &SearchTask,
        stats: &mut TaskStats,
    ) -> TaskState {
        let max_attempts = self.params.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            stats.attempts = attempt;
            let result = match slot.session().await {
                Ok(session) => self.attempt(session, task, stats).await,
                Err(e) => Err(e),
            };

            let err = match result {
                Ok(state) => return state,
                Err(e) => e,
            };

            warn!(
                query = %task.query,
                area = %task.area,
                attempt,
                slot = slot.id(),
                "Search attempt failed: {}",
                err
            );
            stats.last_error = Some(err.to_string());
            if attempt == max_attempts {
                break;
            }

            sleep(self.params.retry_backoff * attempt).await;
            if err.is_fatal() {
                if let Err(restart_err) = slot.restart().await {
                    warn!(slot = slot.id(), "Session restart failed: {}", restart_err);
                    stats.last_error = Some(restart_err.to_string());
                }
            }
        }

        error!(query = %task.query, area = %task.area, "Giving up on {} after {} attempt(s)", task, max_attempts);
        TaskState::Failed(FailureReason::RetriesExhausted)
    }

    /// One pass through the state machine on a live session.
    /// `Err` means the session misbehaved and the task may be retried.
    async fn attempt(
        &self,
        session: &dyn Session,
        task: &SearchTask,
        stats: &mut TaskStats,
    ) -> Result<TaskState, SessionError> {
        self.enter(task, TaskState::Searching);
        let url = match self.layout.search_url(task) {
            Ok(url) => url,
            Err(e) => {
                error!(query = %task.query, area = %task.area, "Cannot build search URL: {:#}", e);
                return Ok(TaskState::Failed(FailureReason::InvalidSearch));
            }
        };
        session.navigate(url.as_str()).await?;

        self.enter(task, TaskState::WaitingForResults);
        let this = self;
        let first = wait_until(self.params.results_timeout, self.params.poll_interval, move || async move {
            this.locate_entries(session).await
        })
        .await?;
        if first.is_none() {
            info!(query = %task.query, area = %task.area, "No results found for {}", task);
            return Ok(TaskState::Failed(FailureReason::NoResults));
        }

        self.enter(task, TaskState::Revealing);
        let available = self.reveal(session).await?;
        stats.entries_found = available;
        let target = available.min(self.params.max_results);
        debug!("{} entries available, processing {}", available, target);

        let mut processed_this_attempt = 0;
        let mut consecutive_failures = 0;
        for index in 0..target {
            self.enter(task, TaskState::ProcessingEntry(index));
            match self.process_entry(session, task, index).await {
                Ok(EntryOutcome::Added(name)) => {
                    info!(entry = index, "Extracted: {}", name);
                    stats.new_records += 1;
                    processed_this_attempt += 1;
                    consecutive_failures = 0;
                }
                Ok(EntryOutcome::Duplicate(name)) => {
                    debug!(entry = index, "Already collected: {}", name);
                    stats.duplicates += 1;
                    processed_this_attempt += 1;
                    consecutive_failures = 0;
                }
                Ok(EntryOutcome::Gone) => {
                    debug!(entry = index, "Result list shrank, stopping");
                    break;
                }
                Err(EntryError::Session(e)) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(query = %task.query, area = %task.area, entry = index, "Failed to process result: {}", e);
                    stats.entry_failures += 1;
                    consecutive_failures += 1;
                    if consecutive_failures >= self.params.max_consecutive_failures {
                        stats.entries_processed += processed_this_attempt;
                        return Ok(TaskState::Failed(FailureReason::TooManyFailures));
                    }
                }
            }

            let pause = jitter(self.params.entry_pause);
            if !pause.is_zero() {
                sleep(pause).await;
            }
        }

        stats.entries_processed += processed_this_attempt;
        if processed_this_attempt > 0 {
            Ok(TaskState::Completed)
        } else {
            Ok(TaskState::Failed(FailureReason::AllEntriesFailed))
        }
    }

    fn enter(&self, task: &SearchTask, state: TaskState) {
        debug!(query = %task.query, area = %task.area, state = %state, "Task state");
    }

    /// First entry locator with a non-zero count, as (locator index, count).
    async fn locate_entries(&self, session: &dyn Session) -> Result<Option<(usize, usize)>, SessionError> {
        for (i, selector) in self.layout.entry_selectors.iter().enumerate() {
            match session.count(selector).await {
                Ok(0) => {}
                Ok(n) => return Ok(Some((i, n))),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Counting '{}' failed: {}", selector, e),
            }
        }
        Ok(None)
    }

    /// Load more entries until the target is reached or the list stops growing.
    async fn reveal(&self, session: &dyn Session) -> Result<usize, SessionError> {
        let mut previous = 0;
        let mut stagnant_rounds = 0;

        loop {
            let count = self.locate_entries(session).await?.map(|(_, n)| n).unwrap_or(0);
            if count >= self.params.max_results || stagnant_rounds >= self.params.stagnation_rounds {
                return Ok(count);
            }
            if count == previous {
                stagnant_rounds += 1;
            } else {
                stagnant_rounds = 0;
            }

            self.scroll_feed(session).await?;
            previous = count;
            if !self.params.scroll_pause.is_zero() {
                sleep(self.params.scroll_pause).await;
            }
        }
    }

    async fn scroll_feed(&self, session: &dyn Session) -> Result<(), SessionError> {
        for selector in &self.layout.feed_selectors {
            match session.scroll_to_end(selector).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Scrolling '{}' failed: {}", selector, e),
            }
        }
        Ok(())
    }

    async fn process_entry(
        &self,
        session: &dyn Session,
        task: &SearchTask,
        index: usize,
    ) -> Result<EntryOutcome, EntryError> {
        let Some((locator, count)) = self.locate_entries(session).await? else {
            return Ok(EntryOutcome::Gone);
        };
        if index >= count {
            return Ok(EntryOutcome::Gone);
        }

        session.click(&self.layout.entry_selectors[locator], index).await?;

        let ready_selector = self.layout.detail_ready.as_str();
        let ready = wait_until(self.params.detail_timeout, self.params.poll_interval, move || async move {
            Ok::<_, SessionError>((session.count(ready_selector).await? > 0).then_some(()))
        })
        .await?;
        if ready.is_none() {
            return Err(SessionError::Timeout(format!("detail view of entry {}", index)).into());
        }
        if !self.params.detail_settle.is_zero() {
            sleep(self.params.detail_settle).await;
        }

        let snapshot = session.snapshot().await?;
        let record = {
            let doc = HtmlDocument::from_snapshot(&snapshot);
            self.extractor.extract(&doc, task)?
        };

        let name = record.name.clone();
        if self.results.offer(record).await {
            Ok(EntryOutcome::Added(name))
        } else {
            Ok(EntryOutcome::Duplicate(name))
        }
    }
}

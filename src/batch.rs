//! Batch execution of search tasks across a fixed pool of sessions.
//!
//! Tasks are fed through a bounded queue to one worker per session. Every
//! worker pauses between its own tasks, and all of them stop when the run is
//! cancelled. A failed task is counted and the batch moves on.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ExitCode, SessionError};
use crate::models::SearchTask;
use crate::scrapers::types::jitter;
use crate::scrapers::{SearchOrchestrator, SessionFactory, SessionPool, SessionSlot, TaskOutcome};

/// Pause between two tasks on the same session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DelayPolicy {
    pub base: Duration,
    /// Upper bound of the random extra added to `base`
    pub jitter: Duration,
}

impl DelayPolicy {
    pub fn next(&self) -> Duration {
        self.base + jitter((Duration::ZERO, self.jitter))
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub total_searches: usize,
    pub attempted_searches: usize,
    pub completed_searches: usize,
    pub failed_searches: usize,
    pub records_collected: usize,
    pub duplicates: usize,
    pub entry_failures: usize,
    pub errors: usize,
    pub elapsed_secs: f64,
    pub success_rate: f64,
    pub results_per_search: f64,
}

impl RunSummary {
    pub fn new(total_searches: usize) -> Self {
        Self {
            total_searches,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: &TaskOutcome) {
        self.attempted_searches += 1;
        if outcome.is_completed() {
            self.completed_searches += 1;
        } else {
            self.failed_searches += 1;
            self.errors += 1;
        }
        self.duplicates += outcome.duplicates;
        self.entry_failures += outcome.entry_failures;
        self.errors += outcome.entry_failures;
    }

    /// Estimated time left, from the average duration of the tasks so far.
    pub fn eta(&self, elapsed: Duration) -> Option<Duration> {
        if self.attempted_searches == 0 {
            return None;
        }
        let remaining = self.total_searches.saturating_sub(self.attempted_searches) as u32;
        Some(elapsed / self.attempted_searches as u32 * remaining)
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total_searches == 0 {
            return 100.0;
        }
        self.attempted_searches as f64 / self.total_searches as f64 * 100.0
    }

    fn log_progress(&self, elapsed: Duration) {
        let eta = self
            .eta(elapsed)
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        info!(
            "📊 Progress: {}/{} ({:.1}%) | {} record(s) | {} error(s) | ETA {}",
            self.attempted_searches,
            self.total_searches,
            self.progress_percent(),
            self.records_collected,
            self.errors,
            eta
        );
    }

    fn finish(&mut self, elapsed: Duration) {
        self.elapsed_secs = elapsed.as_secs_f64();
        if self.attempted_searches > 0 {
            self.success_rate = self.completed_searches as f64 / self.attempted_searches as f64 * 100.0;
        }
        if self.completed_searches > 0 {
            self.results_per_search = self.records_collected as f64 / self.completed_searches as f64;
        }
    }
}

/// Serializable view of one task's outcome.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub query: String,
    pub area: String,
    pub state: String,
    pub attempts: u32,
    pub entries_found: usize,
    pub entries_processed: usize,
    pub new_records: usize,
    pub duplicates: usize,
    pub entry_failures: usize,
    pub error: Option<String>,
    pub elapsed_secs: f64,
}

impl From<&TaskOutcome> for TaskReport {
    fn from(outcome: &TaskOutcome) -> Self {
        Self {
            query: outcome.task.query.clone(),
            area: outcome.task.area.clone(),
            state: outcome.state.to_string(),
            attempts: outcome.attempts,
            entries_found: outcome.entries_found,
            entries_processed: outcome.entries_processed,
            new_records: outcome.new_records,
            duplicates: outcome.duplicates,
            entry_failures: outcome.entry_failures,
            error: outcome.last_error.clone(),
            elapsed_secs: outcome.elapsed.as_secs_f64(),
        }
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub summary: RunSummary,
    /// In completion order
    pub outcomes: Vec<TaskOutcome>,
    pub interrupted: bool,
}

impl BatchReport {
    /// Exit status for a run that saved `records` records.
    pub fn exit_code(&self, records: usize) -> ExitCode {
        if self.interrupted {
            ExitCode::Interrupted
        } else if records == 0 {
            ExitCode::NoResults
        } else if self.summary.failed_searches > 0
            || self.summary.attempted_searches < self.summary.total_searches
        {
            ExitCode::Partial
        } else {
            ExitCode::Success
        }
    }

    pub fn task_reports(&self) -> Vec<TaskReport> {
        self.outcomes.iter().map(TaskReport::from).collect()
    }

    pub fn log_summary(&self) {
        let s = &self.summary;
        info!("==========================================");
        info!("✅ Searches completed: {}/{}", s.completed_searches, s.total_searches);
        if s.failed_searches > 0 {
            warn!("❌ Searches failed: {}", s.failed_searches);
            for outcome in self.outcomes.iter().filter(|o| !o.is_completed()) {
                warn!(
                    "   {} -> {}{}",
                    outcome.task,
                    outcome.state,
                    outcome
                        .last_error
                        .as_deref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                );
            }
        }
        info!("🏢 Unique records: {} ({} duplicate(s) skipped)", s.records_collected, s.duplicates);
        info!("⚠️  Entry failures: {}", s.entry_failures);
        info!(
            "⏱️  Elapsed: {} | success rate {:.1}% | {:.1} record(s) per search",
            format_duration(Duration::from_secs_f64(s.elapsed_secs)),
            s.success_rate,
            s.results_per_search
        );
        if self.interrupted {
            warn!("🛑 Run was interrupted; results collected so far are kept");
        }
    }
}

pub struct BatchRunner {
    orchestrator: Arc<SearchOrchestrator>,
    factory: Arc<dyn SessionFactory>,
    concurrency: usize,
    delay: DelayPolicy,
    cancel: CancellationToken,
}

impl BatchRunner {
    pub fn new(
        orchestrator: Arc<SearchOrchestrator>,
        factory: Arc<dyn SessionFactory>,
        concurrency: usize,
        delay: DelayPolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            factory,
            concurrency,
            delay,
            cancel,
        }
    }

    /// Run every task. Fails only when no session can be started.
    pub async fn run(&self, tasks: Vec<SearchTask>) -> Result<BatchReport, SessionError> {
        let started = Instant::now();
        let total = tasks.len();
        let mut summary = RunSummary::new(total);
        if total == 0 {
            summary.finish(started.elapsed());
            return Ok(BatchReport {
                summary,
                outcomes: Vec::new(),
                interrupted: self.cancel.is_cancelled(),
            });
        }

        let pool = SessionPool::start(Arc::clone(&self.factory), self.concurrency.clamp(1, total)).await?;
        info!("🔍 Running {} search(es) on {} session(s)", total, pool.len());

        let (task_tx, task_rx) = mpsc::channel::<SearchTask>(pool.len());
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<TaskOutcome>();

        let feeder_cancel = self.cancel.clone();
        let feeder = tokio::spawn(async move {
            for task in tasks {
                tokio::select! {
                    biased;
                    _ = feeder_cancel.cancelled() => break,
                    sent = task_tx.send(task) => if sent.is_err() { break },
                }
            }
        });

        let mut workers = JoinSet::new();
        for slot in pool.into_slots() {
            workers.spawn(worker(
                slot,
                Arc::clone(&self.orchestrator),
                Arc::clone(&task_rx),
                outcome_tx.clone(),
                self.delay,
                self.cancel.clone(),
            ));
        }
        drop(outcome_tx);

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            summary.record(&outcome);
            summary.records_collected = self.orchestrator.results().len().await;
            summary.log_progress(started.elapsed());
            outcomes.push(outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Search worker stopped abnormally: {}", e);
            }
        }
        if let Err(e) = feeder.await {
            error!("Task feeder stopped abnormally: {}", e);
        }

        summary.records_collected = self.orchestrator.results().len().await;
        summary.finish(started.elapsed());
        Ok(BatchReport {
            summary,
            outcomes,
            interrupted: self.cancel.is_cancelled(),
        })
    }
}

async fn worker(
    mut slot: SessionSlot,
    orchestrator: Arc<SearchOrchestrator>,
    queue: Arc<Mutex<mpsc::Receiver<SearchTask>>>,
    outcomes: mpsc::UnboundedSender<TaskOutcome>,
    delay: DelayPolicy,
    cancel: CancellationToken,
) {
    let mut first = true;
    loop {
        let next = {
            let mut rx = queue.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                task = rx.recv() => task,
            }
        };
        let Some(task) = next else { break };

        if !first {
            let pause = delay.next();
            debug!(slot = slot.id(), "Waiting {:?} before {}", pause, task);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(pause) => {}
            }
        }
        first = false;

        info!(slot = slot.id(), query = %task.query, area = %task.area, "Searching {}", task);
        let outcome = orchestrator.run_task(&mut slot, &task, &cancel).await;
        if outcomes.send(outcome).is_err() || cancel.is_cancelled() {
            break;
        }
    }
    slot.close().await;
    debug!(slot = slot.id(), restarts = slot.restarts(), "Worker finished");
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::{FailureReason, TaskState};

    fn outcome(state: TaskState, new_records: usize, entry_failures: usize) -> TaskOutcome {
        TaskOutcome {
            task: SearchTask::new("gyms", "Reno, NV"),
            state,
            attempts: 1,
            entries_found: new_records + entry_failures,
            entries_processed: new_records,
            entry_failures,
            new_records,
            duplicates: 1,
            last_error: None,
            elapsed: Duration::from_secs(3),
        }
    }

    fn report(summary: RunSummary, interrupted: bool) -> BatchReport {
        BatchReport {
            summary,
            outcomes: Vec::new(),
            interrupted,
        }
    }

    #[test]
    fn test_summary_counts_outcomes() {
        let mut summary = RunSummary::new(3);
        summary.record(&outcome(TaskState::Completed, 4, 1));
        summary.record(&outcome(TaskState::Failed(FailureReason::NoResults), 0, 0));
        summary.records_collected = 4;
        summary.finish(Duration::from_secs(10));

        assert_eq!(summary.attempted_searches, 2);
        assert_eq!(summary.completed_searches, 1);
        assert_eq!(summary.failed_searches, 1);
        assert_eq!(summary.entry_failures, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(summary.duplicates, 2);
        assert_eq!(summary.success_rate, 50.0);
        assert_eq!(summary.results_per_search, 4.0);
    }

    #[test]
    fn test_eta_from_average_task_time() {
        let mut summary = RunSummary::new(4);
        assert_eq!(summary.eta(Duration::from_secs(5)), None);

        summary.record(&outcome(TaskState::Completed, 1, 0));
        assert_eq!(summary.eta(Duration::from_secs(10)), Some(Duration::from_secs(30)));
        assert_eq!(summary.progress_percent(), 25.0);
    }

    #[test]
    fn test_exit_codes() {
        let mut complete = RunSummary::new(1);
        complete.record(&outcome(TaskState::Completed, 2, 0));
        assert_eq!(report(complete.clone(), false).exit_code(2), ExitCode::Success);
        assert_eq!(report(complete.clone(), false).exit_code(0), ExitCode::NoResults);
        assert_eq!(report(complete, true).exit_code(2), ExitCode::Interrupted);

        let mut partial = RunSummary::new(2);
        partial.record(&outcome(TaskState::Completed, 2, 0));
        partial.record(&outcome(TaskState::Failed(FailureReason::TooManyFailures), 0, 5));
        assert_eq!(report(partial, false).exit_code(2), ExitCode::Partial);

        let mut unfinished = RunSummary::new(3);
        unfinished.record(&outcome(TaskState::Completed, 2, 0));
        assert_eq!(report(unfinished, false).exit_code(2), ExitCode::Partial);
    }

    #[test]
    fn test_delay_policy_range() {
        let policy = DelayPolicy {
            base: Duration::from_secs(2),
            jitter: Duration::from_secs(1),
        };
        for _ in 0..50 {
            let d = policy.next();
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(3));
        }
        assert_eq!(DelayPolicy::default().next(), Duration::ZERO);
    }

    #[test]
    fn test_task_report_from_outcome() {
        let mut failed = outcome(TaskState::Failed(FailureReason::RetriesExhausted), 0, 0);
        failed.attempts = 3;
        failed.last_error = Some("browser disconnected".to_string());
        let report = TaskReport::from(&failed);
        assert_eq!(report.state, "failed(retries_exhausted)");
        assert_eq!(report.attempts, 3);
        assert_eq!(report.error.as_deref(), Some("browser disconnected"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(42)), "42s");
        assert_eq!(format_duration(Duration::from_secs(130)), "2m 10s");
        assert_eq!(format_duration(Duration::from_secs(7260)), "2h 1m");
    }
}

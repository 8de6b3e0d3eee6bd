use std::time::Duration;

/// Limits and timings that drive one search task.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Maximum number of result entries to process per task
    pub max_results: usize,
    /// How long to wait for the first result entry to appear
    pub results_timeout: Duration,
    /// How long to wait for a detail view after clicking an entry
    pub detail_timeout: Duration,
    /// Interval between polls while waiting
    pub poll_interval: Duration,
    /// Pause after each "load more" scroll
    pub scroll_pause: Duration,
    /// Extra time given to a detail view after it appears
    pub detail_settle: Duration,
    /// Random pause between entries, drawn from this range
    pub entry_pause: (Duration, Duration),
    /// Scroll rounds without new entries before revealing stops
    pub stagnation_rounds: u32,
    /// Consecutive entry failures that abort the task
    pub max_consecutive_failures: u32,
    /// Total attempts per task when the session dies
    pub max_attempts: u32,
    /// Base backoff before a retry, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Upper bound for a whole task, retries included
    pub task_timeout: Duration,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            max_results: 10,
            results_timeout: Duration::from_secs(20),
            detail_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_millis(250),
            scroll_pause: Duration::from_millis(1500),
            detail_settle: Duration::from_secs(2),
            entry_pause: (Duration::from_millis(500), Duration::from_millis(1500)),
            stagnation_rounds: 3,
            max_consecutive_failures: 5,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(5),
            task_timeout: Duration::from_secs(300),
        }
    }
}

impl SearchParams {
    /// Timings collapsed to near zero, for driving scripted sessions.
    pub fn immediate() -> Self {
        Self {
            results_timeout: Duration::from_millis(50),
            detail_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(1),
            scroll_pause: Duration::ZERO,
            detail_settle: Duration::ZERO,
            entry_pause: (Duration::ZERO, Duration::ZERO),
            retry_backoff: Duration::ZERO,
            task_timeout: Duration::from_secs(10),
            ..Self::default()
        }
    }
}

/// Random duration in `[low, high]`; `low` when the range is empty.
pub fn jitter((low, high): (Duration, Duration)) -> Duration {
    use rand::Rng;
    if high <= low {
        return low;
    }
    rand::thread_rng().gen_range(low..=high)
}

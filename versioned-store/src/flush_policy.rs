use std::time::{Duration, Instant};

pub const DEFAULT_MIN_FLUSH_COUNT: usize = 1;
pub const DEFAULT_MAX_FLUSH_COUNT: usize = 500;
pub const DEFAULT_SHUTDOWN_FLUSH_WINDOW: Duration = Duration::from_secs(60);

/// How many irreversible layers accumulate before they are flushed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushPolicy {
    pub min_flush_count: usize,
    pub max_flush_count: usize,
    /// A shutdown due within this window switches to `min_flush_count`.
    pub shutdown_flush_window: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            min_flush_count: DEFAULT_MIN_FLUSH_COUNT,
            max_flush_count: DEFAULT_MAX_FLUSH_COUNT,
            shutdown_flush_window: DEFAULT_SHUTDOWN_FLUSH_WINDOW,
        }
    }
}

impl FlushPolicy {
    pub fn flush_count(&self, shutdown_deadline: Option<Instant>, now: Instant) -> usize {
        let imminent = shutdown_deadline
            .map(|deadline| deadline.saturating_duration_since(now) <= self.shutdown_flush_window)
            .unwrap_or(false);
        let count = if imminent {
            self.min_flush_count
        } else {
            self.max_flush_count
        };
        count.max(1)
    }
}

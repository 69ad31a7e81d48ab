use std::time::Duration;

use anyhow::Result;

/// Fixed-interval polling with a capped number of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe satisfied the predicate on this attempt (1-based).
    Ready { value: T, attempt: u32 },
    /// Every attempt ran without satisfying the predicate.
    TimedOut { last: Option<T> },
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Wait one interval, probe, and stop as soon as `done` holds.
    /// Probe errors are logged and count as a spent attempt.
    pub async fn poll<T, P, D>(&self, mut probe: P, done: D) -> PollOutcome<T>
    where
        P: FnMut() -> Result<T>,
        D: Fn(&T) -> bool,
    {
        let mut last = None;
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.interval).await;
            match probe() {
                Ok(value) if done(&value) => return PollOutcome::Ready { value, attempt },
                Ok(value) => last = Some(value),
                Err(e) => tracing::warn!(attempt, error = %e, "poll probe failed"),
            }
        }
        PollOutcome::TimedOut { last }
    }
}

//! Wall-clock timestamps that never go backwards within a session.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Anchors a wall-clock time to a monotonic instant.
///
/// `now()` is the anchor plus monotonic elapsed time, so system clock
/// adjustments during a session cannot reorder results.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    base_utc: DateTime<Utc>,
    base: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            base_utc: Utc::now(),
            base: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.base.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.base_utc + elapsed
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_clock_follows_monotonic_time() {
        let clock = SessionClock::new();
        let first = clock.now();
        tokio::time::sleep(Duration::from_millis(250)).await;
        let second = clock.now();
        assert_eq!((second - first).num_milliseconds(), 250);
    }
}

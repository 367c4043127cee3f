//! Rolling-window request budget.
//!
//! Caps the rate of paid backend calls per period. Exceeding the budget is
//! a normal outcome, not an error: the executor surfaces it as
//! `skipped_budget` and the caller renders "try again shortly".
//!
//! The window resets lazily at the start of every `try_consume`, never via
//! a background timer, so behavior is deterministic under an injected
//! clock.

use aeris_core::{BudgetConfig, Clock};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Point-in-time budget view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BudgetStatus {
    /// Units consumed in the current window
    pub used: u32,

    /// Window limit
    pub limit: u32,

    /// When the current window rolls over
    pub window_resets_at: DateTime<Utc>,
}

struct BudgetWindow {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Rolling-window consumption tracker.
pub struct BudgetTracker {
    window: Mutex<BudgetWindow>,
    config: BudgetConfig,
    clock: Arc<dyn Clock>,
}

impl BudgetTracker {
    /// Create a tracker; the first window starts now.
    pub fn new(config: BudgetConfig, clock: Arc<dyn Clock>) -> Self {
        let started_at = clock.now();
        Self {
            window: Mutex::new(BudgetWindow {
                started_at,
                count: 0,
            }),
            config,
            clock,
        }
    }

    fn period(&self) -> ChronoDuration {
        ChronoDuration::from_std(self.config.period).unwrap_or(ChronoDuration::MAX)
    }

    fn roll_if_elapsed(&self, window: &mut BudgetWindow, now: DateTime<Utc>) {
        if now - window.started_at >= self.period() {
            window.started_at = now;
            window.count = 0;
        }
    }

    /// Atomically check and consume.
    ///
    /// Returns false without mutating state if consuming `amount` would
    /// exceed the limit. Admission-time enforcement: a request that would
    /// exceed the budget is rejected, never clamped afterward.
    pub fn try_consume(&self, amount: u32) -> bool {
        let now = self.clock.now();
        let mut window = self.window.lock();
        self.roll_if_elapsed(&mut window, now);

        match window.count.checked_add(amount) {
            Some(next) if next <= self.config.limit => {
                window.count = next;
                true
            }
            _ => {
                tracing::warn!(
                    used = window.count,
                    limit = self.config.limit,
                    "budget exhausted for current window"
                );
                false
            }
        }
    }

    /// Current usage, limit, and window rollover instant.
    pub fn status(&self) -> BudgetStatus {
        let now = self.clock.now();
        let mut window = self.window.lock();
        self.roll_if_elapsed(&mut window, now);

        BudgetStatus {
            used: window.count,
            limit: self.config.limit,
            window_resets_at: window.started_at + self.period(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeris_core::ManualClock;
    use std::time::Duration;

    fn tracker_with(limit: u32, period: Duration) -> (BudgetTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let tracker = BudgetTracker::new(BudgetConfig { limit, period }, clock.clone());
        (tracker, clock)
    }

    #[test]
    fn test_admission_within_limit() {
        let (tracker, _) = tracker_with(3, Duration::from_secs(60));

        assert!(tracker.try_consume(1));
        assert!(tracker.try_consume(1));
        assert!(tracker.try_consume(1));
        assert!(!tracker.try_consume(1));
    }

    #[test]
    fn test_rejection_does_not_mutate() {
        let (tracker, _) = tracker_with(3, Duration::from_secs(60));

        assert!(tracker.try_consume(2));
        assert!(!tracker.try_consume(2));
        // The failed consume left room for a single unit
        assert!(tracker.try_consume(1));
    }

    #[test]
    fn test_window_rolls_over() {
        let (tracker, clock) = tracker_with(3, Duration::from_secs(60));

        for _ in 0..3 {
            assert!(tracker.try_consume(1));
        }
        assert!(!tracker.try_consume(1));

        clock.advance(chrono::Duration::seconds(61));
        assert!(tracker.try_consume(1));
        assert_eq!(tracker.status().used, 1);
    }

    #[test]
    fn test_status_reports_rollover_instant() {
        let (tracker, clock) = tracker_with(3, Duration::from_secs(60));
        let start = clock.now();

        tracker.try_consume(2);
        let status = tracker.status();
        assert_eq!(status.used, 2);
        assert_eq!(status.limit, 3);
        assert_eq!(status.window_resets_at, start + chrono::Duration::seconds(60));
    }

    #[test]
    fn test_oversized_amount_rejected() {
        let (tracker, _) = tracker_with(3, Duration::from_secs(60));
        assert!(!tracker.try_consume(4));
        assert_eq!(tracker.status().used, 0);
    }
}

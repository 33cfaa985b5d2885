//! Quota Policy
//!
//! Sliding-window frequency budgets evaluated against an event history.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::HistoryResult;
use super::tracker::{count_after, nth_last, EventQuotaTracker};

/// Default number of events allowed per window
pub const DEFAULT_MAX_EVENTS: usize = 10;

/// Default window length in milliseconds (one hour)
pub const DEFAULT_WINDOW_MS: i64 = 60 * 60 * 1000;

/// At most `max_events` events within any `window_ms` span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaPolicy {
    /// Events allowed per window
    pub max_events: usize,

    /// Window length, in the same unit as recorded timestamps
    pub window_ms: i64,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            max_events: DEFAULT_MAX_EVENTS,
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaDecision {
    /// Whether an event at the checked time is within quota
    pub allowed: bool,

    /// Events still available in the current window, this one excluded
    pub remaining: usize,

    /// Earliest time at which an event would be admitted (if denied)
    pub retry_at: Option<i64>,

    /// Whether the event was written to the history
    pub recorded: bool,
}

impl QuotaDecision {
    fn allowed(remaining: usize) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_at: None,
            recorded: false,
        }
    }

    fn denied(retry_at: Option<i64>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_at,
            recorded: false,
        }
    }
}

impl QuotaPolicy {
    /// Create a policy
    pub fn new(max_events: usize, window_ms: i64) -> Self {
        Self {
            max_events,
            window_ms,
        }
    }

    /// Check whether an event at `now` would be within quota
    pub fn check(&self, tracker: &EventQuotaTracker, now: i64) -> QuotaDecision {
        self.decide(&tracker.lock_events(), now)
    }

    /// Record an event at `now` if it is within quota
    ///
    /// The check and the write happen under the tracker's lock, so two
    /// concurrent callers cannot both take the last slot of a window.
    pub fn admit(&self, tracker: &EventQuotaTracker, now: i64) -> HistoryResult<QuotaDecision> {
        let mut events = tracker.lock_events();
        let mut decision = self.decide(&events, now);
        if decision.allowed {
            decision.recorded = tracker.append_locked(&mut events, now)?;
            if !decision.recorded {
                // Stale `now`: no slot was taken
                decision.remaining += 1;
            }
        }
        debug!(
            path = %tracker.storage_path().display(),
            now,
            allowed = decision.allowed,
            recorded = decision.recorded,
            "Quota admission"
        );
        Ok(decision)
    }

    fn decide(&self, events: &[i64], now: i64) -> QuotaDecision {
        if self.max_events == 0 {
            return QuotaDecision::denied(None);
        }

        // Events recorded after `now` are outside the window (now - window_ms, now]
        let events = &events[..events.partition_point(|&e| e <= now)];
        let window_start = now.saturating_sub(self.window_ms);
        match nth_last(events, self.max_events) {
            Some(oldest) if oldest > window_start => {
                QuotaDecision::denied(Some(oldest.saturating_add(self.window_ms)))
            }
            _ => {
                let in_window = count_after(events, window_start);
                QuotaDecision::allowed(self.max_events.saturating_sub(in_window + 1))
            }
        }
    }
}

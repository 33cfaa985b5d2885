//! Event Quota Library
//!
//! Durable event histories for quota and frequency checks. Each quota bucket
//! keeps an ordered sequence of monotonic timestamps on disk; callers ask for
//! the Nth-last event or whether a new event fits its budget.
//!
//! ```no_run
//! use event_quota::quota::{EventQuotaTracker, QuotaPolicy};
//!
//! # fn main() -> event_quota::quota::HistoryResult<()> {
//! let tracker = EventQuotaTracker::load("/tmp/alarms.hist")?;
//! tracker.record_event(100)?;
//! tracker.record_event(200)?;
//! assert_eq!(tracker.nth_last_event_time(1), Some(200));
//!
//! let decision = QuotaPolicy::new(2, 1_000).check(&tracker, 500);
//! assert!(!decision.allowed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod quota;

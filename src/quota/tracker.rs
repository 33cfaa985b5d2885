//! Event Quota Tracker
//!
//! Durable, ordered history of event timestamps for one quota bucket.
//!
//! Every tracker owns its in-memory sequence and its backing file. One mutex
//! guards both the sequence and the persistence call, so `record_event` may
//! race from several threads and queries always observe a state that is also
//! on disk.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use super::codec;
use super::error::HistoryResult;

/// Serializable copy of a tracker's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Backing storage location
    pub path: PathBuf,

    /// Recorded timestamps, oldest first
    pub events: Vec<i64>,
}

/// Tracker of event occurrence times, persisted after every mutation
#[derive(Debug)]
pub struct EventQuotaTracker {
    /// Backing storage location
    path: PathBuf,

    /// Strictly increasing monotonic timestamps
    events: Mutex<Vec<i64>>,
}

impl EventQuotaTracker {
    /// Load the history stored at `path`, or start an empty one
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::StorageCorrupt`](super::HistoryError::StorageCorrupt)
    /// if a file exists at `path` but cannot be decoded. A missing file is
    /// not an error.
    pub fn load(path: impl Into<PathBuf>) -> HistoryResult<Self> {
        let path = path.into();

        let events = match codec::read_history(&path) {
            Ok(Some(events)) => {
                info!(path = %path.display(), events = events.len(), "Loaded event history");
                events
            }
            Ok(None) => {
                debug!(path = %path.display(), "No stored event history, starting empty");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load event history");
                return Err(e);
            }
        };

        Ok(Self {
            path,
            events: Mutex::new(events),
        })
    }

    /// Record an event at `timestamp`
    ///
    /// The event is appended only if it is later than the last recorded one;
    /// otherwise the call is a no-op and returns `Ok(false)`. An appended
    /// event is on disk before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Io`](super::HistoryError::Io) if the history
    /// could not be persisted. The event is then not kept in memory either,
    /// so retrying the same call is safe.
    pub fn record_event(&self, timestamp: i64) -> HistoryResult<bool> {
        let mut events = self.lock_events();
        self.append_locked(&mut events, timestamp)
    }

    /// Timestamp of the `n`th most recent event (`n == 1` is the latest)
    pub fn nth_last_event_time(&self, n: usize) -> Option<i64> {
        nth_last(&self.lock_events(), n)
    }

    /// Timestamp of the most recent event
    pub fn last_event_time(&self) -> Option<i64> {
        self.lock_events().last().copied()
    }

    /// Number of recorded events strictly after `timestamp`
    pub fn events_since(&self, timestamp: i64) -> usize {
        count_after(&self.lock_events(), timestamp)
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.lock_events().len()
    }

    /// Whether no event has been recorded
    pub fn is_empty(&self) -> bool {
        self.lock_events().is_empty()
    }

    /// Backing storage location
    pub fn storage_path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            path: self.path.clone(),
            events: self.lock_events().clone(),
        }
    }

    /// Human-readable listing of every recorded timestamp, oldest first
    pub fn dump(&self) -> String {
        let events = self.lock_events();
        let mut out = format!(
            "EventHistory {} ({} events)\n",
            self.path.display(),
            events.len()
        );
        if events.is_empty() {
            out.push_str("  (no events)\n");
        }
        for (i, ts) in events.iter().enumerate() {
            let _ = writeln!(out, "  [{i}] {ts}");
        }
        out
    }

    /// Lock the in-memory sequence
    ///
    /// A poisoned lock is recovered: the sequence is only extended once the
    /// write has succeeded, so it is consistent whenever the lock is free.
    pub(crate) fn lock_events(&self) -> MutexGuard<'_, Vec<i64>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `timestamp` to an already locked sequence and persist it
    pub(crate) fn append_locked(&self, events: &mut Vec<i64>, timestamp: i64) -> HistoryResult<bool> {
        if let Some(&last) = events.last() {
            if timestamp <= last {
                debug!(
                    path = %self.path.display(),
                    timestamp,
                    last,
                    "Ignoring event not later than last recorded"
                );
                return Ok(false);
            }
        }

        events.push(timestamp);
        if let Err(e) = codec::write_history(&self.path, events) {
            events.pop();
            warn!(path = %self.path.display(), timestamp, error = %e, "Failed to persist event history");
            return Err(e);
        }

        debug!(path = %self.path.display(), timestamp, events = events.len(), "Recorded event");
        Ok(true)
    }
}

pub(crate) fn nth_last(events: &[i64], n: usize) -> Option<i64> {
    if n == 0 || n > events.len() {
        return None;
    }
    Some(events[events.len() - n])
}

pub(crate) fn count_after(events: &[i64], timestamp: i64) -> usize {
    events.len() - events.partition_point(|&e| e <= timestamp)
}

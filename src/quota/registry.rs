//! Quota Registry
//!
//! Independent event histories per quota bucket, stored side by side in one
//! directory as `<bucket>.hist`.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::error::{HistoryError, HistoryResult};
use super::tracker::EventQuotaTracker;

/// File extension of stored histories
pub const HISTORY_EXTENSION: &str = "hist";

const MAX_BUCKET_LEN: usize = 128;

/// Trackers keyed by quota bucket name
#[derive(Debug)]
pub struct QuotaRegistry {
    /// Storage directory
    root: PathBuf,

    /// Trackers loaded so far
    trackers: Mutex<HashMap<String, Arc<EventQuotaTracker>>>,
}

impl QuotaRegistry {
    /// Create a registry storing histories under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Storage directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tracker for `bucket`, loading it from storage on first access
    ///
    /// # Errors
    ///
    /// Fails for invalid bucket names and for stored histories that cannot
    /// be loaded. A failed load is not cached.
    pub fn tracker(&self, bucket: &str) -> HistoryResult<Arc<EventQuotaTracker>> {
        validate_bucket(bucket)?;

        let mut trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tracker) = trackers.get(bucket) {
            return Ok(Arc::clone(tracker));
        }

        let tracker = Arc::new(EventQuotaTracker::load(self.path_for(bucket))?);
        trackers.insert(bucket.to_string(), Arc::clone(&tracker));
        Ok(tracker)
    }

    /// Names of buckets loaded by this registry, sorted
    pub fn loaded_buckets(&self) -> Vec<String> {
        let trackers = self.trackers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buckets: Vec<String> = trackers.keys().cloned().collect();
        buckets.sort();
        buckets
    }

    /// Names of buckets with a stored history, sorted
    pub fn stored_buckets(&self) -> HistoryResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HistoryError::io(&self.root, e)),
        };

        let mut buckets = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| HistoryError::io(&self.root, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(HISTORY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_bucket(stem).is_ok() {
                    buckets.push(stem.to_string());
                }
            }
        }
        buckets.sort();
        Ok(buckets)
    }

    fn path_for(&self, bucket: &str) -> PathBuf {
        self.root.join(format!("{bucket}.{HISTORY_EXTENSION}"))
    }
}

/// Check that `bucket` is usable as a file stem
pub fn validate_bucket(bucket: &str) -> HistoryResult<()> {
    let valid = !bucket.is_empty()
        && bucket.len() <= MAX_BUCKET_LEN
        && !bucket.starts_with('.')
        && bucket
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

    if valid {
        Ok(())
    } else {
        Err(HistoryError::InvalidBucket(bucket.to_string()))
    }
}

//! Event History Storage Format
//!
//! A versionless flat encoding of the timestamp sequence:
//!
//! ```text
//! ┌──────────────┬───────────────────────────────────┐
//! │ count: u32BE │ count × timestamp: i64BE           │
//! └──────────────┴───────────────────────────────────┘
//! ```
//!
//! The whole file is rewritten on every mutation. Writes land in a sibling
//! temporary file which is synced and then renamed over the target.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::error::{HistoryError, HistoryResult};

const COUNT_LEN: usize = 4;
const TIMESTAMP_LEN: usize = 8;

/// Reasons a byte buffer is not a valid history
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("expected a 4 byte length prefix, found {0} bytes")]
    MissingPrefix(usize),

    #[error("length prefix declares {count} timestamps ({expected} bytes) but file holds {actual} bytes")]
    LengthMismatch {
        count: u32,
        expected: u64,
        actual: u64,
    },

    #[error("timestamp {current} at index {index} does not follow {previous}")]
    NotIncreasing {
        index: usize,
        previous: i64,
        current: i64,
    },
}

/// Encode a timestamp sequence
pub fn encode(events: &[i64]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(COUNT_LEN + events.len() * TIMESTAMP_LEN);
    buf.extend_from_slice(&(events.len() as u32).to_be_bytes());
    for ts in events {
        buf.extend_from_slice(&ts.to_be_bytes());
    }
    buf
}

/// Decode a timestamp sequence, rejecting truncated, padded or unordered data
pub fn decode(bytes: &[u8]) -> Result<Vec<i64>, DecodeError> {
    let Some((prefix, body)) = bytes.split_first_chunk::<COUNT_LEN>() else {
        return Err(DecodeError::MissingPrefix(bytes.len()));
    };

    let count = u32::from_be_bytes(*prefix);
    let expected = COUNT_LEN as u64 + u64::from(count) * TIMESTAMP_LEN as u64;
    if bytes.len() as u64 != expected {
        return Err(DecodeError::LengthMismatch {
            count,
            expected,
            actual: bytes.len() as u64,
        });
    }

    let mut events: Vec<i64> = Vec::with_capacity(count as usize);
    for (index, chunk) in body.chunks_exact(TIMESTAMP_LEN).enumerate() {
        let mut raw = [0u8; TIMESTAMP_LEN];
        raw.copy_from_slice(chunk);
        let current = i64::from_be_bytes(raw);

        if let Some(&previous) = events.last() {
            if current <= previous {
                return Err(DecodeError::NotIncreasing {
                    index,
                    previous,
                    current,
                });
            }
        }
        events.push(current);
    }

    Ok(events)
}

/// Read the history stored at `path`
///
/// Returns `Ok(None)` when nothing has been stored there yet.
pub fn read_history(path: &Path) -> HistoryResult<Option<Vec<i64>>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(HistoryError::io(path, e)),
    };

    decode(&bytes)
        .map(Some)
        .map_err(|e| HistoryError::corrupt(path, e.to_string()))
}

/// Replace the history stored at `path` with `events`
///
/// The new contents are durable once this returns. An error means the
/// previous contents are still in place.
pub fn write_history(path: &Path, events: &[i64]) -> HistoryResult<()> {
    write_history_with(path, events, sync_dir)
}

fn write_history_with(
    path: &Path,
    events: &[i64],
    sync_parent: impl FnOnce(&Path) -> io::Result<()>,
) -> HistoryResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;

    let tmp_path = temp_path_for(path);
    let write_tmp = || -> io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&encode(events))?;
        file.sync_all()
    };
    if let Err(e) = write_tmp() {
        let _ = fs::remove_file(&tmp_path);
        return Err(HistoryError::io(&tmp_path, e));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(HistoryError::io(path, e));
    }

    // The rename is visible; a failed directory sync must not report the
    // write as lost.
    if let Err(e) = sync_parent(parent) {
        warn!(dir = %parent.display(), error = %e, "Failed to sync history directory after rename");
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("history"));
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(&[1, 256]);
        assert_eq!(
            bytes,
            vec![0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 1, 0]
        );
    }

    #[test]
    fn test_empty_history_encodes_to_prefix_only() {
        assert_eq!(encode(&[]), vec![0, 0, 0, 0]);
        assert_eq!(decode(&[0, 0, 0, 0]).unwrap(), Vec::<i64>::new());
    }

    #[test]
    fn test_decode_negative_timestamps() {
        let bytes = encode(&[-5, -1, 0, 7]);
        assert_eq!(decode(&bytes).unwrap(), vec![-5, -1, 0, 7]);
    }

    #[test]
    fn test_decode_rejects_empty_file() {
        assert_eq!(decode(&[]), Err(DecodeError::MissingPrefix(0)));
    }

    #[test]
    fn test_decode_rejects_truncated_body() {
        let mut bytes = encode(&[100, 200, 300]);
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::LengthMismatch { count: 3, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut bytes = encode(&[100]);
        bytes.push(0xff);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_unordered() {
        let bytes = encode(&[100, 200, 150]);
        assert_eq!(
            decode(&bytes),
            Err(DecodeError::NotIncreasing {
                index: 2,
                previous: 200,
                current: 150,
            })
        );
    }

    #[test]
    fn test_decode_rejects_duplicates() {
        let bytes = encode(&[100, 100]);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::NotIncreasing { index: 1, .. })
        ));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = read_history(&dir.path().join("absent.hist")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("bucket.hist");

        write_history(&path, &[10, 20, 30]).unwrap();
        assert_eq!(read_history(&path).unwrap(), Some(vec![10, 20, 30]));
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_write_replaces_previous_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bucket.hist");

        write_history(&path, &[1, 2, 3, 4]).unwrap();
        write_history(&path, &[9]).unwrap();
        assert_eq!(read_history(&path).unwrap(), Some(vec![9]));
    }

    #[test]
    fn test_read_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bucket.hist");
        fs::write(&path, b"not a history").unwrap();

        let err = read_history(&path).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn test_dir_sync_failure_keeps_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bucket.hist");
        write_history(&path, &[1]).unwrap();

        let result = write_history_with(&path, &[1, 2], |_| {
            Err(io::Error::new(io::ErrorKind::Other, "sync failed"))
        });

        assert!(result.is_ok());
        assert_eq!(read_history(&path).unwrap(), Some(vec![1, 2]));
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/var/lib/quota/app.hist");
        assert_eq!(temp_path_for(path), Path::new("/var/lib/quota/app.hist.tmp"));
    }
}

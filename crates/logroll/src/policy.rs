//! When to roll over to a new output file.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::{Error, Result};

/// Interval used when no rotation trigger is configured.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// The single trigger that decides when the current file is retired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Rotate once the file has been open for at least this long.
    Time(Duration),
    /// Rotate before a record would push the file past this many bytes.
    Size(u64),
    /// Rotate before writing record number `n + 1`.
    MaxLines(u64),
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self::Time(DEFAULT_ROTATION_INTERVAL)
    }
}

/// Counters for the file currently being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStats {
    /// When the file was opened.
    pub created_at: DateTime<Local>,
    /// Bytes written since the file was opened.
    pub bytes_written: u64,
    /// Records written since the file was opened.
    pub lines_written: u64,
}

impl FileStats {
    /// Fresh counters for a file opened at `created_at`.
    #[must_use]
    pub const fn new(created_at: DateTime<Local>) -> Self {
        Self {
            created_at,
            bytes_written: 0,
            lines_written: 0,
        }
    }
}

impl RotationPolicy {
    /// Reject zero thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the interval, size or line limit is zero.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Time(interval) if interval.is_zero() => Err(Error::Configuration(
                "rotation interval must be greater than zero".to_string(),
            )),
            Self::Size(0) => Err(Error::Configuration(
                "rotation size must be greater than zero".to_string(),
            )),
            Self::MaxLines(0) => Err(Error::Configuration(
                "rotation line limit must be greater than zero".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether the current file must be rotated before writing a record of
    /// `pending` bytes at `now`.
    #[must_use]
    pub fn must_rotate(&self, stats: &FileStats, pending: usize, now: DateTime<Local>) -> bool {
        match *self {
            // A clock that moved backwards yields a negative age, which never rotates.
            Self::Time(interval) => now
                .signed_duration_since(stats.created_at)
                .to_std()
                .is_ok_and(|age| age >= interval),
            Self::Size(max_bytes) => {
                stats.bytes_written.saturating_add(pending as u64) > max_bytes
            }
            Self::MaxLines(max_lines) => stats.lines_written.saturating_add(1) > max_lines,
        }
    }
}

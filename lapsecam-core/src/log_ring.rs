//! Operator-facing event log.
//!
//! A bounded ring of human readable lines, newest first, shown in the UI.
//! Every entry is also forwarded to the `log` facade so it ends up in the
//! process log.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Maximum number of entries kept; older ones are dropped.
pub const LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

#[derive(Debug, Default)]
pub struct LogRing {
    entries: RwLock<VecDeque<LogEntry>>,
}

impl LogRing {
    pub fn new() -> Self {
        LogRing {
            entries: RwLock::new(VecDeque::with_capacity(LOG_CAPACITY)),
        }
    }

    /// Append an entry stamped with the current local time.
    pub fn log<S: Into<String>>(&self, message: S) {
        self.push(LogEntry {
            timestamp: Local::now(),
            message: message.into(),
        });
    }

    pub fn push(&self, entry: LogEntry) {
        log::info!("{}", entry.message);

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.push_front(entry);
        entries.truncate(LOG_CAPACITY);
    }

    /// Snapshot of all entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    /// Entries rendered as `[HH:MM:SS] message`, newest first.
    pub fn lines(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.iter().map(|e| e.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

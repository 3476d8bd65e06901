//! The journal: an append-only, levelled event sink.
//!
//! Every component that reports events (the verifier, the averager, the
//! protocol handler, the acceptor) receives an `Arc<dyn Journal>` when it is
//! constructed.  There is no global logger.
//!
//! # Levels
//!
//! | Level      | Used for                                                   |
//! |------------|------------------------------------------------------------|
//! | `INFO`     | Normal progress: connections, successful logins, results  |
//! | `ERROR`    | Recoverable problems: failed logins, bad vectors, clamping |
//! | `CRITICAL` | Conditions that stop the server from starting              |
//!
//! # Thread safety
//!
//! Connections are handled on independent Tokio tasks, so several tasks may
//! write to the same journal at once.  Implementations must serialise their
//! appends internally; callers never coordinate.

use std::fmt;
use std::sync::Mutex;

/// Severity of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Error,
    Critical,
}

impl Level {
    /// The upper-case label written into journal lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The event sink capability.
///
/// Only [`record`](Journal::record) must be implemented; `info` and `error`
/// are the convenience entry points the rest of the code base calls.
pub trait Journal: Send + Sync {
    /// Appends one entry.  Must never fail from the caller's point of view.
    fn record(&self, level: Level, message: &str);

    /// Appends an `INFO` entry.
    fn info(&self, message: &str) {
        self.record(Level::Info, message);
    }

    /// Appends an `ERROR` entry, or a `CRITICAL` one when `critical` is set.
    fn error(&self, message: &str, critical: bool) {
        let level = if critical { Level::Critical } else { Level::Error };
        self.record(level, message);
    }
}

/// One recorded entry held by a [`MemoryJournal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub level: Level,
    pub message: String,
}

/// A journal that keeps its entries in memory.
///
/// Useful for tests and for embedding the core logic where no file sink is
/// wanted.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: Mutex<Vec<JournalEntry>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every entry recorded so far, oldest first.
    pub fn entries(&self) -> Vec<JournalEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns `true` if an entry at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|e| e.level == level && e.message.contains(needle))
    }
}

impl Journal for MemoryJournal {
    fn record(&self, level: Level, message: &str) {
        let entry = JournalEntry {
            level,
            message: message.to_string(),
        };
        // A panic in another test thread must not hide later entries.
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_level_labels_match_journal_format() {
        assert_eq!(Level::Info.to_string(), "INFO");
        assert_eq!(Level::Error.to_string(), "ERROR");
        assert_eq!(Level::Critical.to_string(), "CRITICAL");
    }

    #[test]
    fn test_info_records_info_level() {
        let journal = MemoryJournal::new();
        journal.info("server started");
        assert_eq!(
            journal.entries(),
            vec![JournalEntry {
                level: Level::Info,
                message: "server started".to_string()
            }]
        );
    }

    #[test]
    fn test_error_with_critical_flag_records_critical_level() {
        let journal = MemoryJournal::new();
        journal.error("database is empty", true);
        journal.error("bad vector", false);

        let entries = journal.entries();
        assert_eq!(entries[0].level, Level::Critical);
        assert_eq!(entries[1].level, Level::Error);
    }

    #[test]
    fn test_contains_matches_level_and_substring() {
        let journal = MemoryJournal::new();
        journal.error("Password mismatch for login alice", false);

        assert!(journal.contains(Level::Error, "mismatch"));
        assert!(!journal.contains(Level::Info, "mismatch"));
        assert!(!journal.contains(Level::Error, "bob"));
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        // Arrange: several threads share one journal through the trait object,
        // the same way connection tasks do.
        let journal = Arc::new(MemoryJournal::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let j: Arc<dyn Journal> = journal.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        j.info(&format!("thread {t} entry {i}"));
                    }
                })
            })
            .collect();

        // Act
        for h in handles {
            h.join().unwrap();
        }

        // Assert
        assert_eq!(journal.entries().len(), 400);
    }
}

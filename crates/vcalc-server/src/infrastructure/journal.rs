//! FileJournal: the append-only journal file.
//!
//! Each entry becomes one line:
//!
//! ```text
//! 2026-03-14 09:26:53; INFO; Connection established with 10.0.0.7
//! ```
//!
//! Timestamps are local time.  The file is opened once at startup in
//! create+append mode and shared by every connection task; a mutex keeps
//! lines from interleaving.  Every entry is also forwarded to `tracing`, so
//! the console shows the same events as the file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing::{error, info};
use vcalc_core::{Journal, Level};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats one journal line, newline included.
pub fn format_line(timestamp: &NaiveDateTime, level: Level, message: &str) -> String {
    format!("{}; {level}; {message}\n", timestamp.format(TIMESTAMP_FORMAT))
}

pub struct FileJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileJournal {
    /// Opens (or creates) the journal file for appending.
    ///
    /// # Errors
    ///
    /// Any I/O error from opening the file.  The server treats this as fatal.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> io::Result<()> {
        let mut file = self
            .file
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl Journal for FileJournal {
    fn record(&self, level: Level, message: &str) {
        match level {
            Level::Info => info!(target: "vcalc::journal", "{message}"),
            Level::Error => error!(target: "vcalc::journal", "{message}"),
            Level::Critical => error!(target: "vcalc::journal", critical = true, "{message}"),
        }

        let line = format_line(&Local::now().naive_local(), level, message);
        if let Err(e) = self.append(&line) {
            error!("cannot write to journal {}: {e}", self.path.display());
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

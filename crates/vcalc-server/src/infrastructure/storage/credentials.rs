//! Loads the credential database from disk.
//!
//! The file holds one `login:secret` pair per line.  Parsing rules live in
//! [`CredentialStore::parse`]; this module only owns the file access.

use std::path::{Path, PathBuf};

use thiserror::Error;
use vcalc_core::{CredentialStore, CredentialStoreError, Journal};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open database file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] CredentialStoreError),
}

/// Reads and parses the credential file at `path`.
///
/// An unreadable file is journaled as CRITICAL here; an empty store is
/// journaled by the parser.
///
/// # Errors
///
/// [`LoadError::Io`] if the file cannot be read, [`LoadError::Store`] if it
/// contains no valid entries.
pub fn load_credentials(path: &Path, journal: &dyn Journal) -> Result<CredentialStore, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        journal.error(
            &format!("Cannot open database file: {}", path.display()),
            true,
        );
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    })?;
    Ok(CredentialStore::parse(&text, journal)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use vcalc_core::{CredentialLookup, Level, MemoryJournal};

    fn write_temp(content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("vcalc_test_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("users.conf");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_credentials_reads_valid_file() {
        // Arrange
        let (dir, path) = write_temp("# users\nalice:wonder\r\nbob:builder\n");
        let journal = MemoryJournal::new();

        // Act
        let store = load_credentials(&path, &journal).unwrap();

        // Assert
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("alice").as_deref(), Some("wonder"));
        assert!(journal.contains(Level::Info, "Loaded 2 users"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_credentials_missing_file_is_critical() {
        let journal = MemoryJournal::new();
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/users.conf");

        let err = load_credentials(&path, &journal).unwrap_err();

        assert!(matches!(err, LoadError::Io { .. }));
        assert!(journal.contains(Level::Critical, "Cannot open database file"));
    }

    #[test]
    fn test_load_credentials_without_valid_entries_fails() {
        let (dir, path) = write_temp("no delimiter here\n:nologin\n");
        let journal = MemoryJournal::new();

        let err = load_credentials(&path, &journal).unwrap_err();

        assert!(matches!(
            err,
            LoadError::Store(CredentialStoreError::NoValidEntries)
        ));
        assert!(journal.contains(Level::Error, "invalid line format on line 1"));

        std::fs::remove_dir_all(&dir).ok();
    }
}

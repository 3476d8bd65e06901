//! Credential table: login → secret pairs loaded once at startup.
//!
//! # Text format
//!
//! ```text
//! # comment lines and blank lines are ignored
//! alice:P@ssW0rd
//! bob:secret:with:colons
//! ```
//!
//! Each line is split at its **first** `:`.  Lines without a delimiter or with
//! an empty login or secret are skipped with a journal warning.  A duplicate
//! login replaces the earlier entry (last write wins).
//!
//! After loading, the store is never mutated again.  The server shares it
//! across connection tasks behind an `Arc`, so concurrent readers need no lock.

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::journal::Journal;

/// Errors produced while building a [`CredentialStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialStoreError {
    /// No line of the source produced a usable entry.
    #[error("credential store contains no valid entries")]
    NoValidEntries,
}

/// Why a single source line was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("invalid line format on line {0}")]
    MissingDelimiter(usize),
    #[error("empty login or password on line {0}")]
    EmptyField(usize),
}

/// One login/secret pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub login: String,
    pub secret: String,
}

impl Credential {
    /// Parses one source line.
    ///
    /// Returns `Ok(None)` for lines that carry no entry (blank or comment),
    /// `Ok(Some(..))` for a valid entry, and a [`LineError`] otherwise.
    /// `line_number` is 1-based and only used in the error.
    pub fn parse_line(line: &str, line_number: usize) -> Result<Option<Self>, LineError> {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (login, secret) = line
            .split_once(':')
            .ok_or(LineError::MissingDelimiter(line_number))?;
        if login.is_empty() || secret.is_empty() {
            return Err(LineError::EmptyField(line_number));
        }

        Ok(Some(Self {
            login: login.to_string(),
            secret: secret.to_string(),
        }))
    }
}

/// Read-only access to stored secrets.
///
/// This is the only part of the store the verifier depends on, which keeps the
/// verifier testable against a mock.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialLookup {
    /// Returns the secret stored for `login`, if any.
    fn lookup(&self, login: &str) -> Option<String>;
}

/// In-memory credential table.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entry.  Returns the secret that was replaced.
    pub fn insert(&mut self, credential: Credential) -> Option<String> {
        self.users.insert(credential.login, credential.secret)
    }

    /// Builds a store from line-oriented text.
    ///
    /// Malformed lines are reported to `journal` as non-critical errors and
    /// skipped.  The number of loaded entries is reported as `INFO`.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialStoreError::NoValidEntries`] when nothing usable was
    /// found.  The condition is also journaled as `CRITICAL`, since the server
    /// cannot start without credentials.
    pub fn parse(text: &str, journal: &dyn Journal) -> Result<Self, CredentialStoreError> {
        let mut store = Self::new();
        for (idx, line) in text.lines().enumerate() {
            match Credential::parse_line(line, idx + 1) {
                Ok(Some(credential)) => {
                    store.insert(credential);
                }
                Ok(None) => {}
                Err(e) => journal.error(&e.to_string(), false),
            }
        }

        if store.is_empty() {
            journal.error("User database is empty", true);
            return Err(CredentialStoreError::NoValidEntries);
        }
        journal.info(&format!("Loaded {} users from database", store.len()));
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl CredentialLookup for CredentialStore {
    fn lookup(&self, login: &str) -> Option<String> {
        self.users.get(login).cloned()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::journal::{Level, MemoryJournal};

    #[test]
    fn test_parse_line_splits_at_first_colon() {
        let cred = Credential::parse_line("bob:a:b:c", 1).unwrap().unwrap();
        assert_eq!(cred.login, "bob");
        assert_eq!(cred.secret, "a:b:c");
    }

    #[test]
    fn test_parse_line_skips_comments_and_blank_lines() {
        assert_eq!(Credential::parse_line("# admin:root", 1), Ok(None));
        assert_eq!(Credential::parse_line("", 2), Ok(None));
        assert_eq!(Credential::parse_line("   ", 3), Ok(None));
    }

    #[test]
    fn test_parse_line_trims_carriage_return() {
        let cred = Credential::parse_line("user:P@ssW0rd\r", 1).unwrap().unwrap();
        assert_eq!(cred.secret, "P@ssW0rd");
    }

    #[test]
    fn test_parse_line_rejects_missing_delimiter() {
        assert_eq!(
            Credential::parse_line("nocolonhere", 4),
            Err(LineError::MissingDelimiter(4))
        );
    }

    #[test]
    fn test_parse_line_rejects_empty_login_or_secret() {
        assert_eq!(Credential::parse_line(":secret", 5), Err(LineError::EmptyField(5)));
        assert_eq!(Credential::parse_line("login:", 6), Err(LineError::EmptyField(6)));
    }

    #[test]
    fn test_parse_loads_valid_entries_and_warns_on_bad_lines() {
        // Arrange
        let text = "# users\nalice:one\n\nbroken line\n:nologin\nbob:two\n";
        let journal = MemoryJournal::new();

        // Act
        let store = CredentialStore::parse(text, &journal).unwrap();

        // Assert
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("alice").as_deref(), Some("one"));
        assert_eq!(store.lookup("bob").as_deref(), Some("two"));
        assert!(journal.contains(Level::Error, "invalid line format on line 4"));
        assert!(journal.contains(Level::Error, "empty login or password on line 5"));
        assert!(journal.contains(Level::Info, "Loaded 2 users"));
    }

    #[test]
    fn test_parse_duplicate_login_last_write_wins() {
        let journal = MemoryJournal::new();
        let store = CredentialStore::parse("alice:old\nalice:new\n", &journal).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("alice").as_deref(), Some("new"));
    }

    #[test]
    fn test_parse_without_valid_entries_fails_critically() {
        let journal = MemoryJournal::new();
        let result = CredentialStore::parse("# only a comment\nbad\n", &journal);
        assert_eq!(result.unwrap_err(), CredentialStoreError::NoValidEntries);
        assert!(journal.contains(Level::Critical, "empty"));
    }

    #[test]
    fn test_lookup_unknown_login_returns_none() {
        let store = CredentialStore::new();
        assert_eq!(store.lookup("ghost"), None);
    }

    #[test]
    fn test_insert_returns_replaced_secret() {
        let mut store = CredentialStore::new();
        let first = Credential {
            login: "u".to_string(),
            secret: "1".to_string(),
        };
        let second = Credential {
            login: "u".to_string(),
            secret: "2".to_string(),
        };
        assert_eq!(store.insert(first), None);
        assert_eq!(store.insert(second), Some("1".to_string()));
    }
}

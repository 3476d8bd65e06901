//! CredentialVerifier: checks a client challenge against a stored secret.
//!
//! # Scheme
//!
//! The client picks a 16-character hex salt and sends
//! `salt ++ hex(SHA1(salt ++ secret))`.  The salt enters the hash as its
//! literal hex **text**, not as decoded bytes.  The server recomputes the
//! digest from the stored secret and compares the two hex strings without
//! regard to letter case.
//!
//! # Fail-closed ordering
//!
//! The gates run in a fixed order and each one stops the check:
//!
//! ```text
//! length == 56 ─► salt is hex ─► digest is hex ─► login exists ─► digests equal
//! ```
//!
//! No store lookup happens for a malformed challenge, and no hash is computed
//! for a malformed challenge or an unknown login.

use std::sync::Arc;

use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::auth::challenge::{AuthChallenge, CHALLENGE_LEN};
use crate::domain::credentials::CredentialLookup;
use crate::domain::journal::Journal;

/// The reason a verification attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("message length mismatch, expected {expected}, got {0}", expected = CHALLENGE_LEN)]
    BadLength(usize),
    #[error("invalid hex format in salt")]
    SaltNotHex,
    #[error("invalid hex format in client hash")]
    DigestNotHex,
    #[error("login {0} not found")]
    LoginNotFound(String),
    #[error("password mismatch for login {0}")]
    DigestMismatch(String),
}

/// Verifies authentication challenges and journals the outcome.
#[derive(Clone)]
pub struct CredentialVerifier {
    journal: Arc<dyn Journal>,
}

impl CredentialVerifier {
    pub fn new(journal: Arc<dyn Journal>) -> Self {
        Self { journal }
    }

    /// Returns `true` when `challenge` proves knowledge of the secret stored
    /// for `login`.
    ///
    /// Never panics and never returns an error: every failure is journaled as
    /// a non-critical error and reported as `false`.
    pub fn verify(&self, login: &str, challenge: &str, store: &dyn CredentialLookup) -> bool {
        match self.check(login, challenge, store) {
            Ok(()) => {
                self.journal.info(&format!("Verifier: success for login {login}"));
                true
            }
            Err(reason) => {
                self.journal.error(&format!("Verifier: {reason}"), false);
                false
            }
        }
    }

    /// The gate sequence behind [`verify`](Self::verify), with the failure
    /// reason preserved.
    ///
    /// # Errors
    ///
    /// The first [`AuthFailure`] gate that rejects the input.
    pub fn check(
        &self,
        login: &str,
        challenge: &str,
        store: &dyn CredentialLookup,
    ) -> Result<(), AuthFailure> {
        let challenge = AuthChallenge::parse(challenge)?;
        let secret = store
            .lookup(login)
            .ok_or_else(|| AuthFailure::LoginNotFound(login.to_string()))?;

        let expected = salted_digest(challenge.salt(), &secret);
        if expected.eq_ignore_ascii_case(challenge.digest()) {
            Ok(())
        } else {
            Err(AuthFailure::DigestMismatch(login.to_string()))
        }
    }
}

/// Computes `hex(SHA1(salt ++ secret))` in lower case.
///
/// This is what a well-behaved client sends after its salt.
///
/// # Examples
///
/// ```rust
/// use vcalc_core::auth::verifier::salted_digest;
///
/// let d = salted_digest("0000000000000000", "secret");
/// assert_eq!(d.len(), 40);
/// ```
pub fn salted_digest(salt: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::credentials::{CredentialStore, Credential, MockCredentialLookup};
    use crate::domain::journal::{Level, MemoryJournal};

    const SALT: &str = "0123456789ABCDEF";

    fn make_verifier() -> (CredentialVerifier, Arc<MemoryJournal>) {
        let journal = Arc::new(MemoryJournal::new());
        (CredentialVerifier::new(journal.clone()), journal)
    }

    fn store_with(login: &str, secret: &str) -> CredentialStore {
        let mut store = CredentialStore::new();
        store.insert(Credential {
            login: login.to_string(),
            secret: secret.to_string(),
        });
        store
    }

    #[test]
    fn test_salted_digest_matches_known_sha1() {
        // SHA1("abc") = a9993e36...; here the salt carries the whole input.
        assert_eq!(
            salted_digest("ab", "c"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn test_verify_accepts_correct_digest() {
        let (verifier, journal) = make_verifier();
        let store = store_with("user", "P@ssW0rd");
        let challenge = format!("{SALT}{}", salted_digest(SALT, "P@ssW0rd"));

        assert!(verifier.verify("user", &challenge, &store));
        assert!(journal.contains(Level::Info, "success for login user"));
    }

    #[test]
    fn test_verify_ignores_digest_case() {
        let (verifier, _journal) = make_verifier();
        let store = store_with("user", "P@ssW0rd");
        let digest = salted_digest(SALT, "P@ssW0rd").to_uppercase();

        assert!(verifier.verify("user", &format!("{SALT}{digest}"), &store));
    }

    #[test]
    fn test_salt_case_is_part_of_the_hashed_text() {
        // The salt is hashed as text, so the digest must be computed over the
        // salt exactly as sent.
        let (verifier, _journal) = make_verifier();
        let store = store_with("user", "pw");
        let lower = SALT.to_lowercase();
        let challenge = format!("{lower}{}", salted_digest(&lower, "pw"));

        assert!(verifier.verify("user", &challenge, &store));
        assert_ne!(salted_digest(&lower, "pw"), salted_digest(SALT, "pw"));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let (verifier, journal) = make_verifier();
        let store = store_with("user", "right");
        let challenge = format!("{SALT}{}", salted_digest(SALT, "wrong"));

        assert!(!verifier.verify("user", &challenge, &store));
        assert!(journal.contains(Level::Error, "password mismatch for login user"));
    }

    #[test]
    fn test_check_reports_unknown_login() {
        let (verifier, _journal) = make_verifier();
        let store = store_with("user", "pw");
        let challenge = format!("{SALT}{}", salted_digest(SALT, "pw"));

        assert_eq!(
            verifier.check("ghost", &challenge, &store),
            Err(AuthFailure::LoginNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_malformed_challenge_never_consults_store() {
        // Arrange: a mock store that fails the test if it is ever queried.
        let (verifier, _journal) = make_verifier();
        let mut store = MockCredentialLookup::new();
        store.expect_lookup().never();

        // Act / Assert: wrong length, bad salt, bad digest.
        assert!(!verifier.verify("user", "abc", &store));
        assert!(!verifier.verify("user", &format!("XYZ{}", "0".repeat(53)), &store));
        assert!(!verifier.verify("user", &format!("{SALT}{}", "g".repeat(40)), &store));
    }

    #[test]
    fn test_well_formed_challenge_consults_store_once() {
        let (verifier, _journal) = make_verifier();
        let mut store = MockCredentialLookup::new();
        store
            .expect_lookup()
            .withf(|login| login == "user")
            .times(1)
            .returning(|_| Some("pw".to_string()));
        let challenge = format!("{SALT}{}", salted_digest(SALT, "pw"));

        assert!(verifier.verify("user", &challenge, &store));
    }

    #[test]
    fn test_check_reports_gate_order() {
        let (verifier, _journal) = make_verifier();
        let store = CredentialStore::new();

        assert_eq!(
            verifier.check("x", "short", &store),
            Err(AuthFailure::BadLength(5))
        );
        assert_eq!(
            verifier.check("x", &format!("zzzzzzzzzzzzzzzz{}", "g".repeat(40)), &store),
            Err(AuthFailure::SaltNotHex)
        );
        assert_eq!(
            verifier.check("x", &format!("{SALT}{}", "g".repeat(40)), &store),
            Err(AuthFailure::DigestNotHex)
        );
    }
}

//! The authentication line and the challenge it carries.
//!
//! Wire format of the line the client sends (terminated by `\n`):
//! ```text
//! <login><salt:16 hex><digest:40 hex>
//! ```
//! The challenge is always the **last** 56 characters; everything before it
//! is the login, which may be empty.  There is no separator between the parts.

use thiserror::Error;

use crate::auth::verifier::AuthFailure;

/// Length of the hex salt chosen by the client.
pub const SALT_LEN: usize = 16;
/// Length of a hex-encoded SHA-1 digest.
pub const DIGEST_LEN: usize = 40;
/// Total challenge length: salt followed by digest.
pub const CHALLENGE_LEN: usize = SALT_LEN + DIGEST_LEN;

/// Errors of the authentication phase.
///
/// Every variant ends the connection with an `ERR` reply; the distinction is
/// kept for the journal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The line is shorter than the 56-character challenge.
    #[error("auth message too short: {0} characters")]
    MessageTooShort(usize),

    /// No newline arrived within the line size limit.
    #[error("authentication line too long")]
    LineTooLong,

    /// The line bytes are not valid UTF-8.
    #[error("authentication line is not valid UTF-8")]
    NotUtf8,

    /// The last 56 bytes do not start on a character boundary, so they cannot
    /// be an ASCII challenge.
    #[error("challenge contains non-ASCII characters")]
    NonAsciiChallenge,

    /// The verifier refused the challenge.  The precise reason was journaled
    /// by the verifier.
    #[error("authentication failed for login {0}")]
    Rejected(String),
}

/// A parsed authentication line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub login: String,
    pub challenge: String,
}

impl AuthRequest {
    /// Parses the raw bytes of the authentication line.
    ///
    /// Every `\r` and `\n` byte is dropped first, wherever it occurs.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotUtf8`], or any error from [`AuthRequest::parse`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self, AuthError> {
        let cleaned: Vec<u8> = raw
            .iter()
            .copied()
            .filter(|&b| b != b'\n' && b != b'\r')
            .collect();
        let line = String::from_utf8(cleaned).map_err(|_| AuthError::NotUtf8)?;
        Self::parse(&line)
    }

    /// Splits a newline-free line into login and challenge.
    ///
    /// # Errors
    ///
    /// [`AuthError::MessageTooShort`] if the line has fewer than
    /// [`CHALLENGE_LEN`] bytes, [`AuthError::NonAsciiChallenge`] if the split
    /// point falls inside a multi-byte character.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use vcalc_core::AuthRequest;
    ///
    /// let challenge = "0".repeat(56);
    /// let req = AuthRequest::parse(&format!("alice{challenge}")).unwrap();
    /// assert_eq!(req.login, "alice");
    /// assert_eq!(req.challenge, challenge);
    /// ```
    pub fn parse(line: &str) -> Result<Self, AuthError> {
        if line.len() < CHALLENGE_LEN {
            return Err(AuthError::MessageTooShort(line.len()));
        }
        let split = line.len() - CHALLENGE_LEN;
        if !line.is_char_boundary(split) {
            return Err(AuthError::NonAsciiChallenge);
        }
        let (login, challenge) = line.split_at(split);
        Ok(Self {
            login: login.to_string(),
            challenge: challenge.to_string(),
        })
    }
}

/// A syntactically valid challenge: 16 hex characters of salt followed by
/// 40 hex characters of digest.  Hex letters may be of either case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    salt: String,
    digest: String,
}

impl AuthChallenge {
    /// Validates and splits a challenge string.
    ///
    /// # Errors
    ///
    /// - [`AuthFailure::BadLength`] when the string is not 56 bytes long.
    /// - [`AuthFailure::SaltNotHex`] / [`AuthFailure::DigestNotHex`] when a
    ///   half contains anything outside `0-9A-Fa-f`.
    pub fn parse(challenge: &str) -> Result<Self, AuthFailure> {
        if challenge.len() != CHALLENGE_LEN {
            return Err(AuthFailure::BadLength(challenge.len()));
        }
        // Length is in bytes; a non-ASCII character would make the split
        // point invalid, and it is not hex anyway.
        if !challenge.is_ascii() {
            return Err(AuthFailure::SaltNotHex);
        }
        let (salt, digest) = challenge.split_at(SALT_LEN);
        if !is_hex(salt) {
            return Err(AuthFailure::SaltNotHex);
        }
        if !is_hex(digest) {
            return Err(AuthFailure::DigestNotHex);
        }
        Ok(Self {
            salt: salt.to_string(),
            digest: digest.to_string(),
        })
    }

    /// The salt exactly as the client sent it (case preserved).
    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// The client's digest exactly as sent (case preserved).
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SALT: &str = "0123456789abcdef";
    const DIGEST: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";

    #[test]
    fn test_parse_splits_login_from_trailing_challenge() {
        let line = format!("user{SALT}{DIGEST}");
        let req = AuthRequest::parse(&line).unwrap();
        assert_eq!(req.login, "user");
        assert_eq!(req.challenge, format!("{SALT}{DIGEST}"));
    }

    #[test]
    fn test_parse_accepts_empty_login() {
        let line = format!("{SALT}{DIGEST}");
        let req = AuthRequest::parse(&line).unwrap();
        assert_eq!(req.login, "");
        assert_eq!(req.challenge.len(), CHALLENGE_LEN);
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert_eq!(
            AuthRequest::parse("short"),
            Err(AuthError::MessageTooShort(5))
        );
    }

    #[test]
    fn test_parse_rejects_split_inside_multibyte_char() {
        // "é" is two bytes; 55 ASCII bytes after it put the split in its middle.
        let line = format!("é{}", "a".repeat(55));
        assert_eq!(AuthRequest::parse(&line), Err(AuthError::NonAsciiChallenge));
    }

    #[test]
    fn test_from_bytes_strips_cr_and_lf() {
        let raw = format!("alice{SALT}{DIGEST}\r\n");
        let req = AuthRequest::from_bytes(raw.as_bytes()).unwrap();
        assert_eq!(req.login, "alice");
    }

    #[test]
    fn test_from_bytes_rejects_invalid_utf8() {
        let mut raw = vec![0xFF, 0xFE];
        raw.extend_from_slice(SALT.as_bytes());
        raw.extend_from_slice(DIGEST.as_bytes());
        assert_eq!(AuthRequest::from_bytes(&raw), Err(AuthError::NotUtf8));
    }

    #[test]
    fn test_challenge_parse_splits_salt_and_digest() {
        let c = AuthChallenge::parse(&format!("{SALT}{DIGEST}")).unwrap();
        assert_eq!(c.salt(), SALT);
        assert_eq!(c.digest(), DIGEST);
    }

    #[test]
    fn test_challenge_parse_accepts_upper_case_hex() {
        let upper = format!("{SALT}{DIGEST}").to_uppercase();
        assert!(AuthChallenge::parse(&upper).is_ok());
    }

    #[test]
    fn test_challenge_parse_rejects_wrong_length() {
        assert_eq!(
            AuthChallenge::parse(SALT),
            Err(AuthFailure::BadLength(SALT_LEN))
        );
    }

    #[test]
    fn test_challenge_parse_rejects_non_hex_salt() {
        let bad = format!("0123456789abcdeg{DIGEST}");
        assert_eq!(AuthChallenge::parse(&bad), Err(AuthFailure::SaltNotHex));
    }

    #[test]
    fn test_challenge_parse_rejects_non_hex_digest() {
        let bad = format!("{SALT}{}z", &DIGEST[..39]);
        assert_eq!(AuthChallenge::parse(&bad), Err(AuthFailure::DigestNotHex));
    }
}

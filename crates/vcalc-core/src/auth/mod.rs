//! Authentication phase: line splitting and challenge verification.
//!
//! - **`challenge`** – Splits the client's text line into a login and the
//!   trailing 56-character challenge, and models the challenge itself.
//!
//! - **`verifier`** – Checks a challenge against the stored secret using
//!   `SHA1(salt ++ secret)`.

pub mod challenge;
pub mod verifier;

pub use challenge::{AuthChallenge, AuthError, AuthRequest};
pub use verifier::{AuthFailure, CredentialVerifier};

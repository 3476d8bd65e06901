//! # vcalc-core
//!
//! Shared library for the vcalc vector server containing the authentication
//! rules, the overflow-safe averaging rule, and the binary wire format.
//!
//! This crate has zero dependencies on sockets, the file system, or an async
//! runtime.  The server crate (`vcalc-server`) wires these pieces to real I/O.
//!
//! # Architecture overview
//!
//! A vcalc client talks to the server in two phases over one TCP connection:
//!
//! 1. **Authentication** – the client sends one text line made of its login
//!    followed by a 56-character challenge (16 hex characters of salt and the
//!    40 hex characters of `SHA1(salt ++ secret)`).  The server answers `OK` or
//!    `ERR`.
//! 2. **Vector exchange** – the client sends a count of vectors, then each
//!    vector as a length-prefixed run of big-endian `i32` values.  The server
//!    answers every vector with its clamped arithmetic mean.
//!
//! The modules map onto those phases:
//!
//! - **`domain`** – The collaborators every component receives explicitly:
//!   the [`Journal`] event sink and the credential store.
//!
//! - **`auth`** – Splitting the authentication line and checking the salted
//!   SHA-1 challenge against a stored secret.
//!
//! - **`averager`** – The overflow-safe mean of a vector.
//!
//! - **`protocol`** – Constants, length validation, payload decoding, and
//!   reply framing for the binary vector exchange.

pub mod auth;
pub mod averager;
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `vcalc_core::CredentialVerifier` instead of the full module path.
pub use auth::challenge::{AuthChallenge, AuthError, AuthRequest};
pub use auth::verifier::{AuthFailure, CredentialVerifier};
pub use averager::VectorAverager;
pub use domain::credentials::{Credential, CredentialLookup, CredentialStore, CredentialStoreError};
pub use domain::journal::{Journal, JournalEntry, Level, MemoryJournal};
pub use protocol::wire::ProtocolError;

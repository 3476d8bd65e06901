//! Infrastructure layer for the vcalc server.
//!
//! Contains OS-facing adapters: the TCP acceptor, the file-backed journal,
//! and loading of the credential database and configuration file.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `vcalc_core`, but MUST NOT be imported by the `application` layer.

pub mod journal;
pub mod network;
pub mod storage;

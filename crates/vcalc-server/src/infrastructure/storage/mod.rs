//! Storage infrastructure: the files the server reads at startup.
//!
//! - `config` reads the optional TOML configuration file.
//! - `credentials` reads the `login:secret` database and hands the text to
//!   [`vcalc_core::CredentialStore::parse`].

pub mod config;
pub mod credentials;

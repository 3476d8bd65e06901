//! Application layer for the vcalc server.
//!
//! Holds the per-connection protocol logic.  It talks to its stream through
//! the tokio I/O traits only and knows nothing about sockets or files.

pub mod protocol_handler;

//! Network infrastructure: the TCP listener and per-connection task spawning.

pub mod acceptor;

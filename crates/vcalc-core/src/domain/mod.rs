//! Domain collaborators shared by every vcalc component.
//!
//! - **`journal`** – The append-only event sink.  Components receive it at
//!   construction time instead of reaching for a global logger.
//!
//! - **`credentials`** – The login → secret table and the read-only lookup
//!   capability the verifier depends on.

pub mod credentials;
pub mod journal;

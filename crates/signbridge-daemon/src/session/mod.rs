//! Sign session: one authenticated TCP connection lifecycle.
//!
//! Sessions are deliberately short-lived. Each override phase opens a
//! fresh connection, authenticates, issues its commands, and closes; the
//! controller's token lifetime across idle periods is unverified, so no
//! connection is held open through a hold interval.

mod client;
mod error;

pub use client::{SessionState, SignSession};
pub use error::SessionError;

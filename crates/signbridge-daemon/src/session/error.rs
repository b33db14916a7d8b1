//! Sign session error types.

use std::time::Duration;

use super::client::SessionState;

/// Errors that can occur on a sign session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// TCP connect did not complete within the configured timeout.
    #[error("Connect to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// The sign refused the TCP connection.
    #[error("Connection refused by {0}")]
    ConnectRefused(String),

    /// Other transport-level connect failure.
    #[error("Connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The sign rejected the credentials.
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// No response arrived within the bounded wait.
    #[error("Timed out waiting for response")]
    ResponseTimeout,

    /// The peer sent something that is not a valid protocol response.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The sign reported a device-level failure for a command.
    #[error("Device rejected command: {0}")]
    Device(String),

    /// I/O failure mid-session.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation attempted in the wrong session state.
    #[error("Session is {0:?}, operation requires Ready")]
    NotReady(SessionState),
}

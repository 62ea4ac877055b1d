//! Error types for session setup and command execution.
//!
//! Setup failures (dial, authentication, pty/shell) are always returned to the
//! caller so nobody receives a half-initialized session. Failures inside the
//! background I/O tasks are not errors here: they are logged and flip the
//! session to [`SessionState::Degraded`](crate::session::SessionState).

use thiserror::Error;

/// Errors surfaced by sessions and the session manager.
#[derive(Error, Debug)]
pub enum SessionError {
    /// TCP dial, SSH handshake or connect timeout failure.
    #[error("connect to {address} failed: {reason}")]
    ConnectError { address: String, reason: String },

    /// The device rejected the supplied credentials.
    #[error("authentication failed for user '{user}'")]
    AuthError { user: String },

    /// The pseudo-terminal, shell or channel streams could not be acquired.
    #[error("session setup failed: {0}")]
    SessionSetupError(String),

    /// The command could not be queued; the writer task is gone.
    #[error("write to shell failed: {0}")]
    WriteError(String),

    /// The shell output stream is gone.
    #[error("read from shell failed: {0}")]
    ReadError(String),

    /// A deadline-bounded read expired. Carries the output captured so far.
    #[error("read deadline exceeded: {0}")]
    ReadTimeout(String),

    /// The session has already been closed.
    #[error("session closed")]
    Closed,

    /// `run_commands` was called with an empty command list.
    #[error("no commands to run")]
    NoCommands,
}

impl SessionError {
    pub(crate) fn connect(address: &str, reason: impl ToString) -> Self {
        Self::ConnectError {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure happened before a session existed.
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectError { .. } | Self::AuthError { .. } | Self::SessionSetupError(_)
        )
    }
}

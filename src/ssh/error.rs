// ABOUTME: Error types for SSH session establishment and shell I/O
// Every session error names the host it happened on

use thiserror::Error;

/// Low level failure reported by a shell transport, without host context.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<russh::Error> for TransportError {
    fn from(err: russh::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection to {host} failed: {reason}")]
    Connect { host: String, reason: String },

    #[error("Connection to {host} timed out after {seconds}s")]
    Timeout { host: String, seconds: u64 },

    #[error("Authentication as {user} rejected by {host}")]
    AuthRejected { host: String, user: String },

    #[error("Could not open a shell on {host}: {reason}")]
    Shell { host: String, reason: String },

    #[error("Sending `{command}` to {host} failed: {source}")]
    Send {
        host: String,
        command: String,
        #[source]
        source: TransportError,
    },

    #[error("Reading output from {host} failed: {source}")]
    Read {
        host: String,
        #[source]
        source: TransportError,
    },

    #[error("Console output failed while talking to {host}: {source}")]
    Console {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

impl SessionError {
    /// Host identity the error refers to.
    pub fn host(&self) -> &str {
        match self {
            SessionError::Connect { host, .. }
            | SessionError::Timeout { host, .. }
            | SessionError::AuthRejected { host, .. }
            | SessionError::Shell { host, .. }
            | SessionError::Send { host, .. }
            | SessionError::Read { host, .. }
            | SessionError::Console { host, .. } => host,
        }
    }

    /// The command being transmitted when the error happened, if any.
    pub fn command(&self) -> Option<&str> {
        match self {
            SessionError::Send { command, .. } => Some(command),
            _ => None,
        }
    }
}

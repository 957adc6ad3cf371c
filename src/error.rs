// ABOUTME: Crate-level error taxonomy for registry lookups, sessions, selections and config

use crate::config::ConfigError;
use crate::ssh::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    #[error("Duplicate host name: {0}")]
    DuplicateHost(String),

    #[error("No hosts configured")]
    NoHosts,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid selection: {0:?}")]
    InvalidSelection(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = BenchError> = std::result::Result<T, E>;

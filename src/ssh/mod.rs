// ABOUTME: Remote session execution over interactive SSH shells
// Connects to lab hosts, escalates privileges and drives ordered command lists

pub mod client;
pub mod error;
pub mod runner;
pub mod shell;
pub mod wait;

pub use client::RusshConnector;
pub use error::{SessionError, TransportError};
pub use runner::{OutputMode, RunOutcome, SessionRunner, StreamEnd};
pub use shell::{Connector, Recv, RemoteShell};
pub use wait::{FixedDelay, WaitPolicy};

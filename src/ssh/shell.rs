// ABOUTME: Transport-neutral traits for an interactive remote shell and its connector
// The runner only talks to these traits so tests can substitute scripted shells

use crate::hosts::HostEntry;
use crate::ssh::error::{SessionError, TransportError};
use async_trait::async_trait;

/// Result of one non-blocking read from a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    /// Bytes that were immediately available.
    Data(Vec<u8>),
    /// Nothing arrived within the drain window.
    Idle,
    /// The remote end closed the channel.
    Closed,
}

/// An open interactive shell channel.
#[async_trait]
pub trait RemoteShell: Send {
    /// Write raw bytes to the shell's stdin.
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read whatever output is immediately available.
    async fn recv(&mut self) -> Result<Recv, TransportError>;

    /// Close the channel and the underlying connection.
    ///
    /// Consumes the shell, so it can be called at most once.
    async fn close(self: Box<Self>) -> Result<(), TransportError>;
}

/// Opens authenticated shells on registered hosts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, host: &HostEntry) -> Result<Box<dyn RemoteShell>, SessionError>;
}

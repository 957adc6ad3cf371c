// ABOUTME: russh-backed connector opening password-authenticated interactive shells
//
// Host keys are NOT verified: any key the server presents is accepted and
// only logged. This trust-on-first-use relaxation is meant for isolated lab
// networks and is unsafe anywhere an attacker can sit between operator and VM.

use crate::hosts::HostEntry;
use crate::ssh::error::{SessionError, TransportError};
use crate::ssh::shell::{Connector, Recv, RemoteShell};
use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Terminal size requested for the interactive shell.
const PTY_COLUMNS: u32 = 200;
const PTY_ROWS: u32 = 50;

/// Client handler that accepts every server key.
struct AcceptAnyHostKey {
    host: String,
}

#[async_trait]
impl client::Handler for AcceptAnyHostKey {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        warn!(
            host = %self.host,
            fingerprint = %server_public_key.fingerprint(),
            "Accepting unverified host key"
        );
        Ok(true)
    }
}

/// Opens shells over SSH with password authentication.
#[derive(Clone)]
pub struct RusshConnector {
    config: Arc<client::Config>,
    connect_timeout: Duration,
    drain_window: Duration,
}

impl RusshConnector {
    pub fn new(connect_timeout: Duration, drain_window: Duration) -> Self {
        let config = client::Config {
            inactivity_timeout: None,
            ..Default::default()
        };
        Self {
            config: Arc::new(config),
            connect_timeout,
            drain_window,
        }
    }

    async fn open_shell(
        handle: &Handle<AcceptAnyHostKey>,
        host: &HostEntry,
    ) -> Result<Channel<Msg>, SessionError> {
        let shell_err = |e: russh::Error| SessionError::Shell {
            host: host.identity(),
            reason: e.to_string(),
        };

        let channel = handle.channel_open_session().await.map_err(shell_err)?;
        channel
            .request_pty(false, "xterm", PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await
            .map_err(shell_err)?;
        channel.request_shell(false).await.map_err(shell_err)?;
        Ok(channel)
    }

    /// Connect, authenticate and request an interactive shell.
    async fn establish(&self, host: &HostEntry) -> Result<RusshShell, SessionError> {
        let handler = AcceptAnyHostKey {
            host: host.identity(),
        };
        let mut handle = client::connect(
            self.config.clone(),
            (host.address.as_str(), host.port),
            handler,
        )
        .await
        .map_err(|e| SessionError::Connect {
            host: host.identity(),
            reason: e.to_string(),
        })?;
        debug!(host = %host.name, "Transport established");

        let accepted = handle
            .authenticate_password(host.username.clone(), host.password().to_string())
            .await
            .map_err(|e| SessionError::Connect {
                host: host.identity(),
                reason: e.to_string(),
            })?;
        if !accepted {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication rejected", "en")
                .await;
            return Err(SessionError::AuthRejected {
                host: host.identity(),
                user: host.username.clone(),
            });
        }

        let channel = match Self::open_shell(&handle, host).await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "shell request failed", "en")
                    .await;
                return Err(e);
            }
        };

        Ok(RusshShell {
            handle,
            channel,
            drain_window: self.drain_window,
        })
    }
}

#[async_trait]
impl Connector for RusshConnector {
    /// `connect_timeout` bounds connect, authentication and the shell request.
    async fn open(&self, host: &HostEntry) -> Result<Box<dyn RemoteShell>, SessionError> {
        let shell = tokio::time::timeout(self.connect_timeout, self.establish(host))
            .await
            .map_err(|_| SessionError::Timeout {
                host: host.identity(),
                seconds: self.connect_timeout.as_secs(),
            })??;
        info!(host = %host.name, user = %host.username, "Interactive shell opened");
        Ok(Box::new(shell))
    }
}

/// Interactive shell channel plus the connection that owns it.
struct RusshShell {
    handle: Handle<AcceptAnyHostKey>,
    channel: Channel<Msg>,
    drain_window: Duration,
}

#[async_trait]
impl RemoteShell for RusshShell {
    async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.channel.data(data).await.map_err(TransportError::from)
    }

    async fn recv(&mut self) -> Result<Recv, TransportError> {
        loop {
            let msg = match tokio::time::timeout(self.drain_window, self.channel.wait()).await {
                Err(_) => return Ok(Recv::Idle),
                Ok(None) => return Ok(Recv::Closed),
                Ok(Some(msg)) => msg,
            };

            match msg {
                ChannelMsg::Data { data } => return Ok(Recv::Data(data.to_vec())),
                ChannelMsg::ExtendedData { data, .. } => return Ok(Recv::Data(data.to_vec())),
                ChannelMsg::Eof | ChannelMsg::Close => return Ok(Recv::Closed),
                ChannelMsg::ExitStatus { exit_status } => {
                    debug!(exit_status, "Remote shell exited");
                }
                other => {
                    debug!(?other, "Ignoring channel message");
                }
            }
        }
    }

    async fn close(self: Box<Self>) -> Result<(), TransportError> {
        let RusshShell { handle, channel, .. } = *self;
        let channel_result = channel.close().await;
        let disconnect_result = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
        channel_result?;
        disconnect_result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_times_out_when_server_stalls_after_banner() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"SSH-2.0-stalled\r\n").await.unwrap();
            // Hold the connection open without ever answering.
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let connector = RusshConnector::new(Duration::from_millis(300), Duration::from_millis(50));
        let host = HostEntry::new("stall", "127.0.0.1", port, "lab", "pw");

        let result = tokio::time::timeout(Duration::from_secs(5), connector.open(&host))
            .await
            .expect("open must give up on its own");

        match result {
            Err(SessionError::Timeout { host, .. }) => {
                assert_eq!(host, format!("stall (127.0.0.1:{port})"));
            }
            Err(other) => panic!("expected timeout, got {other}"),
            Ok(_) => panic!("expected timeout, got an open shell"),
        }
        server.abort();
    }
}

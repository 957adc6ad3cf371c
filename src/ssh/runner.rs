// ABOUTME: SessionRunner drives one privileged interactive shell per invocation
// Sends ordered commands with settling delays, then collects or streams the output

use crate::hosts::HostEntry;
use crate::ssh::error::SessionError;
use crate::ssh::shell::{Connector, Recv, RemoteShell};
use crate::ssh::wait::WaitPolicy;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Label used in errors and logs instead of the escalation line, which
/// carries the password.
const ESCALATION_LABEL: &str = "sudo -S -i";

/// How the runner handles remote output once all commands are sent.
#[derive(Debug, Clone)]
pub enum OutputMode {
    /// Drain whatever is immediately available and return it.
    Collect,
    /// Forward output to the console until cancelled or the channel closes.
    Stream(CancellationToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Cancelled,
    RemoteClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Collected(String),
    Streamed { bytes: usize, end: StreamEnd },
}

impl RunOutcome {
    /// Collected text, empty for streamed runs.
    pub fn text(&self) -> &str {
        match self {
            RunOutcome::Collected(text) => text,
            RunOutcome::Streamed { .. } => "",
        }
    }
}

pub struct SessionRunner<C, W> {
    connector: C,
    wait: W,
}

impl<C: Connector, W: WaitPolicy> SessionRunner<C, W> {
    pub fn new(connector: C, wait: W) -> Self {
        Self { connector, wait }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Run `commands` in one privileged shell on `host`.
    ///
    /// `console` receives the `Executing:` echo for each command and, in
    /// streaming mode, the remote output. The shell is closed exactly once
    /// on every path after it has been opened.
    pub async fn run(
        &self,
        host: &HostEntry,
        commands: &[String],
        mode: OutputMode,
        console: &mut (dyn Write + Send),
    ) -> Result<RunOutcome, SessionError> {
        let span = info_span!("session", host = %host.name, session_id = %Uuid::new_v4());
        async move {
            if let OutputMode::Stream(cancel) = &mode {
                if cancel.is_cancelled() {
                    info!("Cancelled before connecting");
                    return Ok(cancelled_stream());
                }
            }
            info!(address = %host.address, port = host.port, commands = commands.len(), "Opening session");
            let mut shell = self.connector.open(host).await?;

            let result = self.drive(shell.as_mut(), host, commands, mode, console).await;

            match (result, shell.close().await) {
                (Ok(outcome), Ok(())) => {
                    info!("Session closed");
                    Ok(outcome)
                }
                (Ok(outcome), Err(e)) => {
                    warn!(error = %e, "Session finished but close failed");
                    Ok(outcome)
                }
                (Err(err), closed) => {
                    if let Err(e) = closed {
                        warn!(error = %e, "Close after failure also failed");
                    }
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        shell: &mut dyn RemoteShell,
        host: &HostEntry,
        commands: &[String],
        mode: OutputMode,
        console: &mut (dyn Write + Send),
    ) -> Result<RunOutcome, SessionError> {
        let cancel = match &mode {
            OutputMode::Stream(cancel) => Some(cancel.clone()),
            OutputMode::Collect => None,
        };
        let cancelled = || cancel.as_ref().is_some_and(CancellationToken::is_cancelled);

        if cancelled() {
            return Ok(cancelled_stream());
        }
        let escalation = format!("echo {} | sudo -S -i\n", shell_quote(host.password()));
        shell
            .send(escalation.as_bytes())
            .await
            .map_err(|source| SessionError::Send {
                host: host.identity(),
                command: ESCALATION_LABEL.to_string(),
                source,
            })?;
        // Escalation is not confirmed; the delay is the only guard.
        if !self.settle(cancel.as_ref()).await {
            return Ok(cancelled_stream());
        }

        for command in commands {
            if cancelled() {
                info!(command = %command, "Cancelled before sending");
                return Ok(cancelled_stream());
            }
            writeln!(console, "Executing: {}", command).map_err(|source| SessionError::Console {
                host: host.identity(),
                source,
            })?;
            debug!(command = %command, "Sending command");
            shell
                .send(format!("{}\n", command).as_bytes())
                .await
                .map_err(|source| SessionError::Send {
                    host: host.identity(),
                    command: command.clone(),
                    source,
                })?;
            if !self.settle(cancel.as_ref()).await {
                return Ok(cancelled_stream());
            }
        }

        match mode {
            OutputMode::Collect => collect(shell, host).await.map(RunOutcome::Collected),
            OutputMode::Stream(cancel) => self.stream(shell, host, &cancel, console).await,
        }
    }

    /// Settle after a send. Returns false if `cancel` fired first.
    async fn settle(&self, cancel: Option<&CancellationToken>) -> bool {
        match cancel {
            None => {
                self.wait.settle().await;
                true
            }
            Some(cancel) => tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = self.wait.settle() => true,
            },
        }
    }

    async fn stream(
        &self,
        shell: &mut dyn RemoteShell,
        host: &HostEntry,
        cancel: &CancellationToken,
        console: &mut (dyn Write + Send),
    ) -> Result<RunOutcome, SessionError> {
        let mut bytes = 0usize;
        let finish = |bytes: usize, end: StreamEnd| -> Result<RunOutcome, SessionError> {
            info!(bytes, ?end, "Stream ended");
            Ok(RunOutcome::Streamed { bytes, end })
        };

        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return finish(bytes, StreamEnd::Cancelled),
                next = shell.recv() => next,
            };

            match next.map_err(|source| SessionError::Read {
                host: host.identity(),
                source,
            })? {
                Recv::Data(data) => {
                    bytes += data.len();
                    console
                        .write_all(&data)
                        .and_then(|()| console.flush())
                        .map_err(|source| SessionError::Console {
                            host: host.identity(),
                            source,
                        })?;
                }
                Recv::Idle => {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return finish(bytes, StreamEnd::Cancelled),
                        () = self.wait.idle() => {}
                    }
                }
                Recv::Closed => return finish(bytes, StreamEnd::RemoteClosed),
            }
        }
    }
}

fn cancelled_stream() -> RunOutcome {
    RunOutcome::Streamed {
        bytes: 0,
        end: StreamEnd::Cancelled,
    }
}

/// Wrap `value` in single quotes for a POSIX shell.
fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Accumulate output until nothing more is immediately available.
///
/// Output that arrives after the first idle read is not collected.
async fn collect(shell: &mut dyn RemoteShell, host: &HostEntry) -> Result<String, SessionError> {
    let mut buf = Vec::new();
    loop {
        match shell.recv().await.map_err(|source| SessionError::Read {
            host: host.identity(),
            source,
        })? {
            Recv::Data(data) => buf.extend_from_slice(&data),
            Recv::Idle | Recv::Closed => break,
        }
    }
    debug!(bytes = buf.len(), "Collected output");
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ABOUTME: Benchmark flow mapping an operator selection to a test binary and target host
// Launches the chosen sender or receiver and streams its output until cancelled

use crate::config::BenchmarkConfig;
use crate::console::Console;
use crate::error::BenchError;
use crate::hosts::{HostRegistry, Role};
use crate::ssh::{Connector, OutputMode, RunOutcome, SessionRunner, StreamEnd, WaitPolicy};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestMode {
    SocketSingleSender,
    SocketMultiSender,
    DpdkSender,
    DpdkReceiver,
    SocketReceiver,
}

impl TestMode {
    pub const ALL: [TestMode; 5] = [
        TestMode::SocketSingleSender,
        TestMode::SocketMultiSender,
        TestMode::DpdkSender,
        TestMode::DpdkReceiver,
        TestMode::SocketReceiver,
    ];

    /// Parse a menu selection (`"1"` to `"5"`), ignoring surrounding whitespace.
    pub fn from_selection(input: &str) -> Result<Self, BenchError> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.selection().to_string() == input.trim())
            .ok_or_else(|| BenchError::InvalidSelection(input.to_string()))
    }

    pub fn selection(self) -> u8 {
        match self {
            TestMode::SocketSingleSender => 1,
            TestMode::SocketMultiSender => 2,
            TestMode::DpdkSender => 3,
            TestMode::DpdkReceiver => 4,
            TestMode::SocketReceiver => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TestMode::SocketSingleSender => "Run Single Thread Sender",
            TestMode::SocketMultiSender => "Run Multi Thread Sender",
            TestMode::DpdkSender => "Run DPDK Sender",
            TestMode::DpdkReceiver => "Run DPDK Receiver",
            TestMode::SocketReceiver => "Run Socket Receiver",
        }
    }

    pub fn role(self) -> Role {
        match self {
            TestMode::SocketSingleSender | TestMode::SocketMultiSender | TestMode::DpdkSender => {
                Role::Sender
            }
            TestMode::DpdkReceiver | TestMode::SocketReceiver => Role::Receiver,
        }
    }

    /// Shell commands for this mode. Receivers ignore `packet_size`.
    pub fn commands(self, work_dir: &str, packet_size: &str) -> Vec<String> {
        let launch = match self {
            TestMode::SocketSingleSender => format!("sudo ./socket_single --size {packet_size}"),
            TestMode::SocketMultiSender => format!("sudo ./socket_mt_send --size {packet_size}"),
            TestMode::DpdkSender => {
                format!("sudo ./dpdk_sender -l 0-3 -n 4 -- -p 0x1 --size {packet_size}")
            }
            TestMode::DpdkReceiver => "sudo ./dpdk_receiver".to_string(),
            TestMode::SocketReceiver => "sudo ./socket_receiver".to_string(),
        };
        vec![format!("cd {work_dir}"), launch]
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.selection(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchmarkOutcome {
    InvalidChoice,
    Finished { host: String, end: StreamEnd },
    Failed { host: String, error: String },
}

impl BenchmarkOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, BenchmarkOutcome::Failed { .. })
    }
}

pub struct BenchmarkFlow<'a, C, W> {
    runner: &'a SessionRunner<C, W>,
    registry: &'a HostRegistry,
    settings: &'a BenchmarkConfig,
}

impl<'a, C: Connector, W: WaitPolicy> BenchmarkFlow<'a, C, W> {
    pub fn new(
        runner: &'a SessionRunner<C, W>,
        registry: &'a HostRegistry,
        settings: &'a BenchmarkConfig,
    ) -> Self {
        Self {
            runner,
            registry,
            settings,
        }
    }

    /// Prompt for whatever is not supplied, then launch the selected test.
    ///
    /// Streaming stops when `cancel` fires, after the configured stream
    /// limit, or when the remote closes the channel.
    pub async fn run(
        &self,
        console: &mut Console,
        packet_size: Option<String>,
        selection: Option<String>,
        cancel: CancellationToken,
    ) -> Result<BenchmarkOutcome, BenchError> {
        let packet_size = match packet_size {
            Some(size) => size,
            None => console.prompt("Set packet size(for sender only): ")?,
        };

        let selection = match selection {
            Some(selection) => selection,
            None => {
                console.say("")?;
                for mode in TestMode::ALL {
                    console.say(mode)?;
                }
                console.prompt("Select an option: ")?
            }
        };

        let mode = match TestMode::from_selection(&selection) {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "Rejected benchmark selection");
                console.say("Invalid choice")?;
                return Ok(BenchmarkOutcome::InvalidChoice);
            }
        };

        let host = self.registry.for_role(mode.role());
        let commands = mode.commands(&self.settings.work_dir, &packet_size);
        info!(mode = mode.label(), host = %host.name, packet_size = %packet_size, "Launching benchmark");

        let limit = self.settings.stream_limit().map(|limit| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                token.cancel();
            })
        });

        let result = self
            .runner
            .run(host, &commands, OutputMode::Stream(cancel), console.writer())
            .await;

        if let Some(timer) = limit {
            timer.abort();
        }

        match result {
            Ok(outcome) => {
                info!(?outcome, "Benchmark finished");
                console.say("")?;
                Ok(BenchmarkOutcome::Finished {
                    host: host.identity(),
                    end: match outcome {
                        RunOutcome::Streamed { end, .. } => end,
                        RunOutcome::Collected(_) => StreamEnd::RemoteClosed,
                    },
                })
            }
            Err(e) => {
                error!(error = %e, command = e.command().unwrap_or("-"), "Benchmark session failed");
                console.say(format!("Benchmark failed on {}: {}", host.identity(), e))?;
                Ok(BenchmarkOutcome::Failed {
                    host: host.identity(),
                    error: e.to_string(),
                })
            }
        }
    }
}

// ABOUTME: Provisioning flow applying the DPDK setup command list to every registered host
//
// The whole flow is retried from the first host on any failure. Steps are
// not tracked, so every command in the list must be safe to run twice
// (mounts, module loads and rebinds all are).

use crate::config::ProvisionConfig;
use crate::console::Console;
use crate::error::BenchError;
use crate::hosts::HostRegistry;
use crate::ssh::{Connector, OutputMode, SessionRunner, WaitPolicy};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounded whole-flow retry: at most `max_attempts` runs, never more.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;

    /// Zero is treated as one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_last(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Completed { attempts: u32 },
    Failed { attempts: u32, last_error: String },
    Interrupted { attempts: u32 },
}

impl ProvisionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ProvisionOutcome::Completed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            ProvisionOutcome::Completed { attempts }
            | ProvisionOutcome::Failed { attempts, .. }
            | ProvisionOutcome::Interrupted { attempts } => *attempts,
        }
    }
}

/// Ordered DPDK host setup commands.
pub fn provisioning_commands(config: &ProvisionConfig) -> Vec<String> {
    let ProvisionConfig {
        pci_address,
        driver,
        hugepages,
        hugepage_mount,
        uio_device,
        ..
    } = config;

    vec![
        "pkg-config --modversion libdpdk".to_string(),
        format!("echo {hugepages} > /sys/kernel/mm/hugepages/hugepages-2048kB/nr_hugepages"),
        format!("mkdir -p {hugepage_mount}"),
        format!("sudo mount -t hugetlbfs nodev {hugepage_mount}"),
        "sudo modprobe uio".to_string(),
        format!("sudo modprobe {driver}"),
        "ip link show".to_string(),
        format!("sudo dpdk-devbind.py -u {pci_address}"),
        format!("sudo dpdk-devbind.py --bind={driver} {pci_address}"),
        "sudo dpdk-devbind.py --status-dev net".to_string(),
        "ls /dev/uio*".to_string(),
        format!("sudo chmod 666 {uio_device}"),
    ]
}

pub struct ProvisionFlow<'a, C, W> {
    runner: &'a SessionRunner<C, W>,
    registry: &'a HostRegistry,
    commands: Vec<String>,
    policy: RetryPolicy,
}

impl<'a, C: Connector, W: WaitPolicy> ProvisionFlow<'a, C, W> {
    pub fn new(
        runner: &'a SessionRunner<C, W>,
        registry: &'a HostRegistry,
        commands: Vec<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            runner,
            registry,
            commands,
            policy,
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Run the flow with whole-flow retry, reporting each failed attempt.
    ///
    /// Only console write failures escape as errors; session failures are
    /// folded into the returned outcome. `cancel` is checked before each
    /// host and stops the flow without further retries.
    pub async fn run(
        &self,
        console: &mut Console,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, BenchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            info!(attempt, max_attempts = self.policy.max_attempts(), "Provisioning hosts");

            let err = match self.attempt(console, cancel).await {
                Ok(()) => {
                    console.say("Initial setup done")?;
                    info!(attempt, "Provisioning complete");
                    return Ok(ProvisionOutcome::Completed { attempts: attempt });
                }
                // A broken console cannot report anything further.
                Err(BenchError::Io(e)) => return Err(BenchError::Io(e)),
                Err(BenchError::Interrupted) => {
                    warn!(attempt, "Provisioning interrupted");
                    console.say("Initialization interrupted.")?;
                    return Ok(ProvisionOutcome::Interrupted { attempts: attempt });
                }
                Err(e) => e,
            };

            warn!(attempt, error = %err, "Provisioning attempt failed");
            console.say(format!("Attempt {} failed: {}", attempt, err))?;

            if self.policy.is_last(attempt) {
                error!(attempts = attempt, "Provisioning failed, retries exhausted");
                console.say("Max retries reached. Initialization failed.")?;
                return Ok(ProvisionOutcome::Failed {
                    attempts: attempt,
                    last_error: err.to_string(),
                });
            }
            console.say("Retrying...")?;
        }
    }

    async fn attempt(
        &self,
        console: &mut Console,
        cancel: &CancellationToken,
    ) -> Result<(), BenchError> {
        for host in self.registry.iter() {
            if cancel.is_cancelled() {
                return Err(BenchError::Interrupted);
            }
            console.say(format!("Provisioning {}", host.identity()))?;
            let outcome = self
                .runner
                .run(host, &self.commands, OutputMode::Collect, console.writer())
                .await?;
            console.say(outcome.text())?;
        }
        Ok(())
    }
}

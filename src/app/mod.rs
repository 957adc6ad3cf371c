// ABOUTME: Application wiring for the operator menu and the non-interactive commands
// Owns the loaded configuration, host registry and session runner

pub mod menu;

pub use menu::{MainMenu, MenuOutcome};

use crate::config::AppConfig;
use crate::console::Console;
use crate::error::BenchError;
use crate::flows::{
    provisioning_commands, BenchmarkFlow, BenchmarkOutcome, ProvisionFlow, ProvisionOutcome,
    RetryPolicy,
};
use crate::hosts::HostRegistry;
use crate::ssh::{Connector, FixedDelay, RusshConnector, SessionRunner, WaitPolicy};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct App<C, W> {
    config: AppConfig,
    registry: HostRegistry,
    runner: SessionRunner<C, W>,
}

impl App<RusshConnector, FixedDelay> {
    /// Wire the SSH connector and fixed delays from configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, BenchError> {
        let registry = config.build_registry()?;
        let connector =
            RusshConnector::new(config.timing.connect_timeout(), config.timing.drain_window());
        let wait = FixedDelay {
            settle: config.timing.settle(),
            poll_interval: config.timing.poll_interval(),
        };
        info!(hosts = ?registry.names(), "Host registry ready");
        Ok(Self::new(config, registry, SessionRunner::new(connector, wait)))
    }
}

impl<C: Connector, W: WaitPolicy> App<C, W> {
    pub fn new(config: AppConfig, registry: HostRegistry, runner: SessionRunner<C, W>) -> Self {
        Self {
            config,
            registry,
            runner,
        }
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn runner(&self) -> &SessionRunner<C, W> {
        &self.runner
    }

    pub async fn provision(
        &self,
        console: &mut Console,
        cancel: &CancellationToken,
    ) -> Result<ProvisionOutcome, BenchError> {
        ProvisionFlow::new(
            &self.runner,
            &self.registry,
            provisioning_commands(&self.config.provision),
            RetryPolicy::new(self.config.provision.max_attempts),
        )
        .run(console, cancel)
        .await
    }

    pub async fn benchmark(
        &self,
        console: &mut Console,
        packet_size: Option<String>,
        selection: Option<String>,
        cancel: CancellationToken,
    ) -> Result<BenchmarkOutcome, BenchError> {
        BenchmarkFlow::new(&self.runner, &self.registry, &self.config.benchmark)
            .run(console, packet_size, selection, cancel)
            .await
    }

    /// Print the registry without credentials.
    pub fn list_hosts(&self, console: &mut Console) -> Result<(), BenchError> {
        for host in self.registry.iter() {
            console.say(format!(
                "{:<12} {}@{}:{}",
                host.name, host.username, host.address, host.port
            ))?;
        }
        Ok(())
    }

    /// Interactive top-level menu: initialize hosts or run a benchmark.
    pub async fn run_menu(
        &self,
        console: &mut Console,
        cancel: CancellationToken,
    ) -> Result<MenuOutcome, BenchError> {
        for line in MainMenu::LINES {
            console.say(line)?;
        }
        let choice = console.prompt("Select an option: ")?;

        match MainMenu::parse(&choice) {
            Ok(MainMenu::Initialize) => Ok(MenuOutcome::Provisioned(
                self.provision(console, &cancel).await?,
            )),
            Ok(MainMenu::Benchmark) => Ok(MenuOutcome::Benchmarked(
                self.benchmark(console, None, None, cancel).await?,
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected menu selection");
                console.say("Invalid choice")?;
                Ok(MenuOutcome::InvalidChoice)
            }
        }
    }
}

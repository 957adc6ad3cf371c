// ABOUTME: Main entry point for the dpdk-bench operator CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dpdk_bench::app::{App, MenuOutcome};
use dpdk_bench::config::AppConfig;
use dpdk_bench::console::Console;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "dpdk-bench", version, about = "Provision DPDK lab VMs and launch benchmarks over SSH")]
struct Cli {
    /// Path to the TOML config file (falls back to $DPDK_BENCH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also print log events to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prepare every registered host for DPDK (hugepages, uio, device binding)
    Init,
    /// Launch a sender or receiver and stream its output
    Bench {
        /// Packet size passed to sender binaries
        #[arg(short, long)]
        size: Option<String>,
        /// Test mode 1-5 (prompted when omitted)
        #[arg(short, long)]
        mode: Option<String>,
    },
    /// List registered hosts
    Hosts,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    setup_panic_handler();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let path = AppConfig::resolve_path(cli.config.as_deref())?;
    let config = AppConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    let app = App::from_config(config).context("Invalid host configuration")?;
    let mut console = Console::stdio();

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let succeeded = match cli.command {
        None => app.run_menu(&mut console, cancel).await?.succeeded(),
        Some(Command::Init) => {
            MenuOutcome::Provisioned(app.provision(&mut console, &cancel).await?).succeeded()
        }
        Some(Command::Bench { size, mode }) => {
            MenuOutcome::Benchmarked(app.benchmark(&mut console, size, mode, cancel).await?)
                .succeeded()
        }
        Some(Command::Hosts) => {
            app.list_hosts(&mut console)?;
            true
        }
    };

    info!(succeeded, "Exiting");
    Ok(succeeded)
}

/// First Ctrl-C cancels the running flow so sessions close cleanly; a
/// second one exits immediately.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("Could not install Ctrl-C handler");
            return;
        }
        info!("Interrupt received, stopping");
        eprintln!("\nStopping... press Ctrl-C again to force exit");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });
}

fn setup_logging(verbose: bool) {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    // Create log directory if it doesn't exist
    let log_dir = dirs::home_dir()
        .map(|home| home.join(".dpdk-bench").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".dpdk-bench/logs"));

    let _ = std::fs::create_dir_all(&log_dir);

    let log_file = log_dir.join(format!(
        "dpdk-bench-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));

    let file_layer = match OpenOptions::new().create(true).append(true).open(&log_file) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        ),
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_file.display(), e);
            None
        }
    };

    let stderr_layer = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dpdk_bench=info".into()),
        )
        .init();
}

fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs in ~/.dpdk-bench/logs for more details.");
        default_hook(panic_info);
    }));
}

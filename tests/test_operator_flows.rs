// ABOUTME: End-to-end tests of the operator menu driven from a TOML config and scripted hosts

use dpdk_bench::app::{App, MenuOutcome};
use dpdk_bench::config::AppConfig;
use dpdk_bench::console::Console;
use dpdk_bench::flows::{BenchmarkOutcome, ProvisionOutcome};
use dpdk_bench::ssh::{RemoteShell, SessionError, SessionRunner, StreamEnd};
use dpdk_bench::testing::{Recorder, RecordingWait, ScriptedConnector, ScriptedShell, SharedBuffer};
use std::io::Cursor;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
[[hosts]]
name = "sender-vm"
address = "192.168.56.10"
username = "lab"
password_env = "SENDER_PW"

[[hosts]]
name = "receiver-vm"
address = "192.168.56.11"
username = "lab"
password_env = "RECEIVER_PW"

[provision]
max_attempts = 3
pci_address = "0000:00:09.0"

[benchmark]
work_dir = "/opt/dpdk-bench"
"#;

fn env(var: &str) -> Option<String> {
    match var {
        "SENDER_PW" => Some("s3nd".to_string()),
        "RECEIVER_PW" => Some("r3cv".to_string()),
        _ => None,
    }
}

fn app_with(connector: ScriptedConnector, recorder: &Recorder) -> App<ScriptedConnector, RecordingWait> {
    let config = AppConfig::from_toml_str(CONFIG).unwrap();
    let registry = config.build_registry_with(env).unwrap();
    App::new(
        config,
        registry,
        SessionRunner::new(connector, RecordingWait::new(recorder.clone())),
    )
}

#[tokio::test]
async fn test_initialize_uses_configured_device_and_credentials() {
    let recorder = Recorder::new();
    let shell_recorder = recorder.clone();
    let connector = ScriptedConnector::new(move |_, _| {
        Ok(Box::new(ScriptedShell::new(shell_recorder.clone())) as Box<dyn RemoteShell>)
    });
    let app = app_with(connector, &recorder);
    let out = SharedBuffer::new();
    let mut console = Console::new(Cursor::new("1\n"), out.clone());

    let outcome = app.run_menu(&mut console, CancellationToken::new()).await.unwrap();

    assert!(outcome.succeeded());
    let sends = recorder.sends();
    assert_eq!(sends[0], "echo 's3nd' | sudo -S -i");
    assert!(sends.contains(&"echo 'r3cv' | sudo -S -i".to_string()));
    assert!(sends.contains(&"sudo dpdk-devbind.py --bind=uio_pci_generic 0000:00:09.0".to_string()));
    assert_eq!(
        app.runner().connector().opened(),
        vec!["sender-vm", "receiver-vm"]
    );
    assert!(out.contents().ends_with("Initial setup done\n"));
}

#[tokio::test]
async fn test_initialize_exhausts_retries() {
    let recorder = Recorder::new();
    let connector = ScriptedConnector::new(|host, _| {
        Err(SessionError::Timeout {
            host: host.identity(),
            seconds: 10,
        })
    });
    let app = app_with(connector, &recorder);
    let out = SharedBuffer::new();
    let mut console = Console::new(Cursor::new("1\n"), out.clone());

    let outcome = app.run_menu(&mut console, CancellationToken::new()).await.unwrap();

    match &outcome {
        MenuOutcome::Provisioned(ProvisionOutcome::Failed { attempts, last_error }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(
                last_error,
                "Connection to sender-vm (192.168.56.10:22) timed out after 10s"
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!outcome.succeeded());
    assert_eq!(app.runner().connector().opened().len(), 3);
    assert!(out
        .contents()
        .ends_with("Max retries reached. Initialization failed.\n"));
}

#[tokio::test]
async fn test_benchmark_dpdk_sender_in_configured_directory() {
    let recorder = Recorder::new();
    let shell_recorder = recorder.clone();
    let connector = ScriptedConnector::new(move |_, _| {
        Ok(Box::new(
            ScriptedShell::new(shell_recorder.clone())
                .with_output(&["EAL: Detected 4 lcore(s)\n"])
                .then_close(),
        ) as Box<dyn RemoteShell>)
    });
    let app = app_with(connector, &recorder);
    let out = SharedBuffer::new();
    let mut console = Console::new(Cursor::new(""), out.clone());

    let outcome = app
        .benchmark(
            &mut console,
            Some("1024".to_string()),
            Some("3".to_string()),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(matches!(outcome, BenchmarkOutcome::Finished { ref host, .. } if host.starts_with("sender-vm")));
    assert_eq!(
        recorder.sends(),
        vec![
            "echo 's3nd' | sudo -S -i",
            "cd /opt/dpdk-bench",
            "sudo ./dpdk_sender -l 0-3 -n 4 -- -p 0x1 --size 1024",
        ]
    );
    assert!(out.contents().contains("EAL: Detected 4 lcore(s)\n"));
}

#[tokio::test]
async fn test_benchmark_after_interrupt_launches_nothing() {
    let recorder = Recorder::new();
    let shell_recorder = recorder.clone();
    let connector = ScriptedConnector::new(move |_, _| {
        Ok(Box::new(ScriptedShell::new(shell_recorder.clone())) as Box<dyn RemoteShell>)
    });
    let app = app_with(connector, &recorder);
    let mut console = Console::new(Cursor::new("2\n64\n1\n"), SharedBuffer::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = app.run_menu(&mut console, cancel).await.unwrap();

    assert!(matches!(
        outcome,
        MenuOutcome::Benchmarked(BenchmarkOutcome::Finished {
            end: StreamEnd::Cancelled,
            ..
        })
    ));
    assert!(app.runner().connector().opened().is_empty());
    assert!(recorder.sends().is_empty());
}

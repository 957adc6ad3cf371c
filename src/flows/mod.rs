// ABOUTME: Operator-facing flows built on the session runner
// Provisioning prepares every host for DPDK; benchmarking launches one test with live output

pub mod benchmark;
pub mod provision;

pub use benchmark::{BenchmarkFlow, BenchmarkOutcome, TestMode};
pub use provision::{provisioning_commands, ProvisionFlow, ProvisionOutcome, RetryPolicy};

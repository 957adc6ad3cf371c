// ABOUTME: Library crate for dpdk-bench exposing hosts, SSH sessions and flows for the binary and tests

pub mod app;
pub mod config;
pub mod console;
pub mod error;
pub mod flows;
pub mod hosts;
pub mod ssh;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{BenchError, Result};

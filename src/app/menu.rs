// ABOUTME: Top-level operator menu choices and the combined outcome of one menu run

use crate::error::BenchError;
use crate::flows::{BenchmarkOutcome, ProvisionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainMenu {
    Initialize,
    Benchmark,
}

impl MainMenu {
    pub const LINES: [&'static str; 2] = ["1. Initialize DPDK environment", "2. Run benchmarks"];

    pub fn parse(input: &str) -> Result<Self, BenchError> {
        match input.trim() {
            "1" => Ok(MainMenu::Initialize),
            "2" => Ok(MainMenu::Benchmark),
            _ => Err(BenchError::InvalidSelection(input.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuOutcome {
    Provisioned(ProvisionOutcome),
    Benchmarked(BenchmarkOutcome),
    InvalidChoice,
}

impl MenuOutcome {
    /// Whether the process should exit with status 0.
    ///
    /// An invalid choice only aborts the flow; it is not a failure.
    pub fn succeeded(&self) -> bool {
        match self {
            MenuOutcome::Provisioned(outcome) => outcome.is_success(),
            MenuOutcome::Benchmarked(outcome) => !outcome.is_failure(),
            MenuOutcome::InvalidChoice => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::StreamEnd;

    #[test]
    fn test_parse() {
        assert_eq!(MainMenu::parse("1").unwrap(), MainMenu::Initialize);
        assert_eq!(MainMenu::parse("2\n").unwrap(), MainMenu::Benchmark);
        assert!(matches!(
            MainMenu::parse("3"),
            Err(BenchError::InvalidSelection(s)) if s == "3"
        ));
    }

    #[test]
    fn test_succeeded() {
        assert!(MenuOutcome::InvalidChoice.succeeded());
        assert!(MenuOutcome::Benchmarked(BenchmarkOutcome::Finished {
            host: "vm1".into(),
            end: StreamEnd::Cancelled,
        })
        .succeeded());
        assert!(!MenuOutcome::Provisioned(ProvisionOutcome::Failed {
            attempts: 3,
            last_error: "refused".into(),
        })
        .succeeded());
        assert!(!MenuOutcome::Provisioned(ProvisionOutcome::Interrupted { attempts: 1 }).succeeded());
    }
}

// ABOUTME: Injectable wait policy replacing hard-coded sleeps between shell commands
//
// Commands are paced with fixed settling delays instead of completion
// acknowledgements. Ordering is best-effort: a command that outlives the
// settling delay will have the next one queued in the shell's input buffer.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait WaitPolicy: Send + Sync {
    /// Pause after privilege escalation and after every transmitted command.
    async fn settle(&self);

    /// Pause between stream polls when no output is available.
    async fn idle(&self);
}

/// Sleeps for fixed durations.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub settle: Duration,
    pub poll_interval: Duration,
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl WaitPolicy for FixedDelay {
    async fn settle(&self) {
        tokio::time::sleep(self.settle).await;
    }

    async fn idle(&self) {
        tokio::time::sleep(self.poll_interval).await;
    }
}

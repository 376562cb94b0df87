// ABOUTME: Exit gate port invoked once every device reached a terminal state.
// ABOUTME: Schedules the optional OS shutdown and terminates the application.

use async_trait::async_trait;
use std::time::Duration;

use crate::power::PowerOffMode;

#[async_trait]
pub trait ExitGate: Send + Sync {
    /// Ask the host OS to power down after `delay`.
    async fn schedule_os_shutdown(&self, delay: Duration) -> Result<(), ExitGateError>;

    /// Terminate the application. Called exactly once per completed exit.
    fn terminate(&self, mode: PowerOffMode);
}

#[derive(Debug, thiserror::Error)]
pub enum ExitGateError {
    #[error("failed to launch OS shutdown command: {0}")]
    Launch(#[from] std::io::Error),

    #[error("OS shutdown command exited with {0}")]
    Status(std::process::ExitStatus),
}

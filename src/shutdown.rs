// ABOUTME: Exit gate backed by the host OS shutdown command.
// ABOUTME: Termination is signalled through a watch channel the binary waits on.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::watch;

use crate::config::OsShutdownConfig;
use crate::ports::{ExitGate, ExitGateError};
use crate::power::PowerOffMode;

pub struct SystemExitGate {
    config: OsShutdownConfig,
    /// When false the command is only logged.
    allow_os_shutdown: bool,
    last_command: Mutex<Option<Vec<String>>>,
    terminated: watch::Sender<Option<PowerOffMode>>,
}

impl SystemExitGate {
    pub fn new(config: OsShutdownConfig, allow_os_shutdown: bool) -> Self {
        let (terminated, _) = watch::channel(None);
        Self {
            config,
            allow_os_shutdown,
            last_command: Mutex::new(None),
            terminated,
        }
    }

    /// The last OS shutdown command line, whether it ran or not.
    pub fn last_command(&self) -> Option<Vec<String>> {
        self.last_command.lock().clone()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.borrow().is_some()
    }

    /// Wait until `terminate` has been called and return its mode.
    pub async fn wait_terminated(&self) -> PowerOffMode {
        let mut rx = self.terminated.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(mode) => mode.unwrap_or_default(),
            // the sender lives in self, so the channel cannot close here
            Err(_) => PowerOffMode::Invalid,
        }
    }
}

#[async_trait]
impl ExitGate for SystemExitGate {
    async fn schedule_os_shutdown(&self, delay: Duration) -> Result<(), ExitGateError> {
        let (program, args) = self.config.render(delay);
        let command_line: Vec<String> = std::iter::once(program.clone())
            .chain(args.iter().cloned())
            .collect();
        *self.last_command.lock() = Some(command_line.clone());

        if !self.allow_os_shutdown {
            tracing::info!(command = ?command_line, "OS shutdown disabled, not running command");
            return Ok(());
        }

        tracing::info!(command = ?command_line, "running OS shutdown command");
        let status = Command::new(&program).args(&args).status().await?;
        if !status.success() {
            return Err(ExitGateError::Status(status));
        }
        Ok(())
    }

    fn terminate(&self, mode: PowerOffMode) {
        tracing::info!(%mode, "terminating");
        self.terminated.send_replace(Some(mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_gate_only_records_command() {
        let gate = SystemExitGate::new(OsShutdownConfig::default(), false);

        gate.schedule_os_shutdown(Duration::from_secs(120))
            .await
            .unwrap();

        assert_eq!(
            gate.last_command(),
            Some(vec!["shutdown".to_string(), "-h".to_string(), "+2".to_string()])
        );
    }

    #[tokio::test]
    async fn terminate_wakes_waiter() {
        let gate = std::sync::Arc::new(SystemExitGate::new(OsShutdownConfig::default(), false));
        assert!(!gate.is_terminated());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait_terminated().await })
        };
        gate.terminate(PowerOffMode::MainScreenExit);

        assert_eq!(waiter.await.unwrap(), PowerOffMode::MainScreenExit);
        assert!(gate.is_terminated());
    }

    #[tokio::test]
    async fn failing_command_reports_status() {
        let config: OsShutdownConfig = serde_yaml::from_str("command: [\"false\"]").unwrap();
        let gate = SystemExitGate::new(config, true);

        let err = gate
            .schedule_os_shutdown(Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ExitGateError::Status(_)));
    }
}

// ABOUTME: Control proxy port for commands sent to the instrument backend.
// ABOUTME: Stop-test, run-maintenance and force power-off.

use async_trait::async_trait;

use crate::types::{DeviceSerial, MaintainGroupId};

/// Remote instrument commands.
///
/// `Ok(())` means the backend accepted the message, not that the device reached
/// the requested state. Completion is observed through bus events.
#[async_trait]
pub trait ControlProxy: Send + Sync {
    /// Stop testing on every running instrument.
    async fn stop_test(&self) -> Result<(), ControlError>;

    /// Run the given maintenance group on a device subset.
    async fn run_maintenance(
        &self,
        group: MaintainGroupId,
        devices: &[DeviceSerial],
    ) -> Result<(), ControlError>;

    /// Force power-off of the given devices.
    async fn power_off(&self, devices: &[DeviceSerial]) -> Result<(), ControlError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("command rejected by backend: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

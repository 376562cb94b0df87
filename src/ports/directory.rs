// ABOUTME: Device directory port listing every connected instrument.
// ABOUTME: Source of the status snapshot the classifier partitions.

use async_trait::async_trait;

use crate::types::DeviceInfo;

/// Current status and type of every known device.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// List all devices with their current kind and status.
    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("device directory unavailable: {0}")]
    Unavailable(String),
}

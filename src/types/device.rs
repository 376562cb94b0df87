// ABOUTME: Instrument identity and work-state types reported by the device directory.
// ABOUTME: Includes the status-change payload carried on the event bus.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DeviceSerial;

/// The instrument family of a connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Unknown or misconfigured device; never controlled.
    Invalid,
    Chemistry,
    Immunoassay,
    Ise,
    /// Sample transport track. Only controllable when a pipeline is configured.
    Track,
}

/// Work state reported by an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Disconnected,
    Standby,
    Halt,
    Running,
    Maintaining,
    Warmup,
    SampleStop,
    SampleStopFault,
    WaitOpenLid,
}

impl DeviceStatus {
    /// Whether a device in this state has stopped testing (normal or abnormal stop).
    pub fn is_stopped(self) -> bool {
        matches!(self, DeviceStatus::Halt | DeviceStatus::Standby)
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStatus::Disconnected => "disconnected",
            DeviceStatus::Standby => "standby",
            DeviceStatus::Halt => "halt",
            DeviceStatus::Running => "running",
            DeviceStatus::Maintaining => "maintaining",
            DeviceStatus::Warmup => "warmup",
            DeviceStatus::SampleStop => "sample-stop",
            DeviceStatus::SampleStopFault => "sample-stop-fault",
            DeviceStatus::WaitOpenLid => "wait-open-lid",
        };
        write!(f, "{s}")
    }
}

/// Snapshot of one device as listed by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial: DeviceSerial,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
}

impl DeviceInfo {
    pub fn new(serial: DeviceSerial, kind: DeviceKind, status: DeviceStatus) -> Self {
        Self {
            serial,
            kind,
            status,
        }
    }
}

/// Payload of a device-status-changed event.
///
/// The status is optional: some updates only carry other fields and must not
/// be read as a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatusUpdate {
    pub serial: DeviceSerial,
    pub status: Option<DeviceStatus>,
}

impl DeviceStatusUpdate {
    pub fn new(serial: DeviceSerial, status: DeviceStatus) -> Self {
        Self {
            serial,
            status: Some(status),
        }
    }
}

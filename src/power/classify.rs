// ABOUTME: Partitions a device snapshot into halt, standby and other record sets.
// ABOUTME: Pure function over the snapshot; routing depends on the power-off mode.

use std::collections::{BTreeMap, HashSet};

use crate::ports::DirectoryError;
use crate::types::{DeviceInfo, DeviceKind, DeviceSerial, DeviceStatus, MaintainGroupKind};

use super::mode::PowerOffMode;
use super::record::DeviceRecordSet;

/// Per-device maintenance kind requested ahead of power-off.
pub type StopMaintainOverrides = BTreeMap<DeviceSerial, MaintainGroupKind>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// Track devices are only controlled when a physical pipeline exists.
    pub pipeline_configured: bool,
}

/// The three disjoint device groups of one exit attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Halted devices: force power-off only.
    pub halt: DeviceRecordSet,
    /// Idle devices: shutdown maintenance first.
    pub standby: DeviceRecordSet,
    /// Everything still busy: stop testing first.
    pub other: DeviceRecordSet,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("device directory lists {0} more than once")]
    DuplicateSerial(DeviceSerial),
}

/// Whether a device takes part in power-off at all.
pub fn is_controllable(device: &DeviceInfo, options: ClassifierOptions) -> bool {
    match (device.kind, device.status) {
        (DeviceKind::Invalid, _) => false,
        (_, DeviceStatus::Disconnected) => false,
        (DeviceKind::Track, _) => options.pipeline_configured,
        _ => true,
    }
}

/// Partition `devices` for the given mode and apply maintenance overrides.
pub fn classify(
    devices: &[DeviceInfo],
    mode: PowerOffMode,
    options: ClassifierOptions,
    overrides: &StopMaintainOverrides,
) -> Result<Classification, ClassifyError> {
    let mut seen = HashSet::with_capacity(devices.len());
    let mut sets = Classification::default();

    for device in devices {
        if !seen.insert(&device.serial) {
            return Err(ClassifyError::DuplicateSerial(device.serial.clone()));
        }

        if !is_controllable(device, options) {
            tracing::debug!(serial = %device.serial, kind = ?device.kind, status = %device.status, "excluded from power-off");
            continue;
        }

        let target = match device.status {
            DeviceStatus::Standby => &mut sets.standby,
            // Halted instruments still need a reset-first maintenance pass
            // before the main screen may exit.
            DeviceStatus::Halt if mode == PowerOffMode::MainScreenExit => &mut sets.standby,
            DeviceStatus::Halt => &mut sets.halt,
            _ => &mut sets.other,
        };
        target.insert(device.serial.clone());
    }

    for set in [&mut sets.halt, &mut sets.standby, &mut sets.other] {
        for (serial, kind) in overrides {
            set.set_maintain_kind(serial, *kind);
        }
        set.update_finished_flag();
    }

    tracing::info!(
        %mode,
        halt = sets.halt.len(),
        standby = sets.standby.len(),
        other = sets.other.len(),
        "classified devices"
    );

    Ok(sets)
}

// ABOUTME: Per-group bookkeeping of devices taking part in an exit attempt.
// ABOUTME: Tracks membership, maintenance kind, completion and failures.

use std::collections::BTreeMap;

use crate::types::{DeviceSerial, MaintainGroupKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub serial: DeviceSerial,
    pub maintain_kind: MaintainGroupKind,
    pub already_notified: bool,
}

impl DeviceRecord {
    fn new(serial: DeviceSerial) -> Self {
        Self {
            serial,
            maintain_kind: MaintainGroupKind::default(),
            already_notified: false,
        }
    }
}

/// Result of recording a device completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Unknown device, already recorded, or the set had already finished.
    Ignored,
    Recorded,
    /// This record finished the whole set.
    Completed,
}

/// Devices of one class and how far each has got.
///
/// `is_finished()` becomes true exactly when every member has been recorded,
/// or immediately via `update_finished_flag` when the set is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecordSet {
    members: BTreeMap<DeviceSerial, DeviceRecord>,
    finished_count: usize,
    finished: bool,
    failed: Vec<DeviceSerial>,
}

impl DeviceRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device. Adding an existing member is a no-op.
    pub fn insert(&mut self, serial: DeviceSerial) {
        self.members
            .entry(serial.clone())
            .or_insert_with(|| DeviceRecord::new(serial));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, serial: &DeviceSerial) -> bool {
        self.members.contains_key(serial)
    }

    pub fn is_recorded(&self, serial: &DeviceSerial) -> bool {
        self.members
            .get(serial)
            .is_some_and(|r| r.already_notified)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn finished_count(&self) -> usize {
        self.finished_count
    }

    pub fn failed(&self) -> &[DeviceSerial] {
        &self.failed
    }

    /// Member serials in sorted order.
    pub fn serials(&self) -> Vec<DeviceSerial> {
        self.members.keys().cloned().collect()
    }

    /// Maintenance kind for a device, defaulting to a regular stop group.
    pub fn maintain_kind(&self, serial: &DeviceSerial) -> MaintainGroupKind {
        self.members
            .get(serial)
            .map(|r| r.maintain_kind)
            .unwrap_or_default()
    }

    /// Override the maintenance kind of a member. Non-members are ignored.
    pub fn set_maintain_kind(&mut self, serial: &DeviceSerial, kind: MaintainGroupKind) {
        if let Some(record) = self.members.get_mut(serial) {
            record.maintain_kind = kind;
        }
    }

    /// Member serials grouped by maintenance kind.
    pub fn group_by_kind(&self) -> BTreeMap<MaintainGroupKind, Vec<DeviceSerial>> {
        let mut grouped: BTreeMap<MaintainGroupKind, Vec<DeviceSerial>> = BTreeMap::new();
        for record in self.members.values() {
            grouped
                .entry(record.maintain_kind)
                .or_default()
                .push(record.serial.clone());
        }
        grouped
    }

    /// Mark an empty set finished.
    pub fn update_finished_flag(&mut self) {
        if self.members.is_empty() {
            self.finished = true;
        }
    }

    /// Record that a member reached its terminal state.
    pub fn record(&mut self, serial: &DeviceSerial) -> RecordOutcome {
        if self.finished {
            return RecordOutcome::Ignored;
        }
        let Some(record) = self.members.get_mut(serial) else {
            return RecordOutcome::Ignored;
        };
        if record.already_notified {
            return RecordOutcome::Ignored;
        }

        record.already_notified = true;
        self.finished_count += 1;
        if self.finished_count == self.members.len() {
            self.finished = true;
            RecordOutcome::Completed
        } else {
            RecordOutcome::Recorded
        }
    }

    /// Record a member as finished with a failure.
    pub fn record_failure(&mut self, serial: &DeviceSerial) -> RecordOutcome {
        let outcome = self.record(serial);
        if outcome != RecordOutcome::Ignored {
            self.failed.push(serial.clone());
        }
        outcome
    }

    /// Record every remaining member at once.
    pub fn record_all(&mut self) {
        for record in self.members.values_mut() {
            record.already_notified = true;
        }
        self.finished_count = self.members.len();
        self.finished = true;
    }
}

// ABOUTME: Maintenance group definitions and execution reports.
// ABOUTME: Groups are ordered item lists identified by a numeric id and a kind.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::DeviceSerial;

/// Which maintenance group a device runs before power-off.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MaintainGroupKind {
    /// Regular shutdown maintenance.
    #[default]
    Stop,
    Start,
    /// Weekly maintenance, requested when a device is due for it.
    Week,
    Single,
    Custom,
    Other,
}

impl fmt::Display for MaintainGroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MaintainGroupKind::Stop => "stop",
            MaintainGroupKind::Start => "start",
            MaintainGroupKind::Week => "week",
            MaintainGroupKind::Single => "single",
            MaintainGroupKind::Custom => "custom",
            MaintainGroupKind::Other => "other",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintainItemKind {
    /// Instrument reset. Shutdown groups must start with one.
    Reset,
    ResetAfterTest,
    CleanTrack,
    ProbeClean,
    /// The instrument powers itself down at the end of the group.
    AutoShutdown,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaintainGroupId(i64);

impl MaintainGroupId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for MaintainGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintainItem {
    pub kind: MaintainItemKind,
}

impl From<MaintainItemKind> for MaintainItem {
    fn from(kind: MaintainItemKind) -> Self {
        Self { kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintainGroup {
    pub id: MaintainGroupId,
    pub kind: MaintainGroupKind,
    pub items: Vec<MaintainItem>,
}

impl MaintainGroup {
    pub fn new(
        id: MaintainGroupId,
        kind: MaintainGroupKind,
        items: impl IntoIterator<Item = MaintainItemKind>,
    ) -> Self {
        Self {
            id,
            kind,
            items: items.into_iter().map(MaintainItem::from).collect(),
        }
    }

    pub fn first_item(&self) -> Option<MaintainItemKind> {
        self.items.first().map(|i| i.kind)
    }

    /// Whether the instrument powers itself off when the group completes.
    pub fn ends_with_auto_shutdown(&self) -> bool {
        self.items
            .last()
            .is_some_and(|i| i.kind == MaintainItemKind::AutoShutdown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintainResult {
    Success,
    Fail,
    Executing,
}

/// Latest maintenance progress reported for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaintainReport {
    pub serial: DeviceSerial,
    pub group_id: MaintainGroupId,
    pub result: MaintainResult,
}

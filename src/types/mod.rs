// ABOUTME: Domain types shared by the orchestrator, the ports and the simulator.
// ABOUTME: Validated serials, device states, maintenance groups and users.

mod device;
mod maintain;
mod serial;
mod user;

pub use device::{DeviceInfo, DeviceKind, DeviceStatus, DeviceStatusUpdate};
pub use maintain::{
    MaintainGroup, MaintainGroupId, MaintainGroupKind, MaintainItem, MaintainItemKind,
    MaintainReport, MaintainResult,
};
pub use serial::{DeviceSerial, DeviceSerialError};
pub use user::{PrivilegeLevel, UserInfo};

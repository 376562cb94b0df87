// ABOUTME: Power-off orchestration for the instrument fleet.
// ABOUTME: Classification, maintenance resolution, the exit state machine and delayed power-off.

mod classify;
mod delayed;
mod error;
mod manager;
mod mode;
mod orchestrator;
mod record;
mod resolver;
mod settings;

pub use classify::{
    Classification, ClassifierOptions, ClassifyError, StopMaintainOverrides, classify,
    is_controllable,
};
pub use delayed::DelayedPowerOff;
pub use error::{PowerError, PowerErrorKind};
pub use manager::{PowerManager, PowerManagerHandle, PowerSnapshot};
pub use mode::{PowerNotification, PowerOffMode, PowerState, StartOutcome};
pub use record::{DeviceRecord, DeviceRecordSet, RecordOutcome};
pub use resolver::{MaintainGroupResolver, ResolveError};
pub use settings::PowerSettings;

// ABOUTME: Traits for every external collaborator of the power-off orchestrator.
// ABOUTME: Directory, control, maintenance groups, event bus, prompt, user and exit gate.

mod bus;
mod control;
mod directory;
mod exit;
mod groups;
mod prompt;
mod user;

pub use bus::{BusEvent, EventBus, Handler, LocalBus, Subscription, SubscriptionId, Topic};
pub use control::{ControlError, ControlProxy};
pub use directory::{DeviceDirectory, DirectoryError};
pub use exit::{ExitGate, ExitGateError};
pub use groups::{MaintainGroupDirectory, QueryError};
pub use prompt::{Notice, Question, UserPrompt};
pub use user::{CurrentUser, FixedUser};

use std::sync::Arc;

/// The full set of collaborators handed to the power manager.
#[derive(Clone)]
pub struct Ports {
    pub directory: Arc<dyn DeviceDirectory>,
    pub control: Arc<dyn ControlProxy>,
    pub groups: Arc<dyn MaintainGroupDirectory>,
    pub bus: Arc<dyn EventBus>,
    pub prompt: Arc<dyn UserPrompt>,
    pub user: Arc<dyn CurrentUser>,
    pub gate: Arc<dyn ExitGate>,
}

// ABOUTME: Power-off modes and orchestrator lifecycle states.
// ABOUTME: Mode decides which device classes get maintenance and which are refused.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which screen requested the exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerOffMode {
    /// No exit in progress.
    #[default]
    Invalid,
    /// Exit from the login screen: running instruments may be stopped,
    /// halted instruments are powered off without maintenance.
    LoginScreenExit,
    /// Exit from the main screen: only allowed while every instrument is idle,
    /// halted instruments also run shutdown maintenance.
    MainScreenExit,
}

impl fmt::Display for PowerOffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerOffMode::Invalid => write!(f, "invalid"),
            PowerOffMode::LoginScreenExit => write!(f, "login-screen"),
            PowerOffMode::MainScreenExit => write!(f, "main-screen"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PowerState {
    #[default]
    Idle,
    /// Commands dispatched, waiting for devices to finish.
    Running,
    /// Every device finished; the settle timer is armed.
    AwaitingSettle,
    /// Settled; waiting for delayed power-offs before terminating.
    Exiting,
}

/// How a `start_exit` call ended its dispatch phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Commands were sent; completion arrives through notifications.
    Dispatched,
    /// The operator chose not to stop running instruments.
    Declined,
    /// Main-screen exit refused because instruments are still running.
    Refused,
    /// `cancel_exit` arrived while the operator was still being asked.
    Cancelled,
}

/// Broadcast to everyone watching the exit sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerNotification {
    Started { mode: PowerOffMode },
    Settling,
    ReadyToExit { mode: PowerOffMode },
    ExitFailed { reason: String },
    Cancelled,
}

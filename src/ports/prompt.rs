// ABOUTME: Operator prompt port for confirmations and informational notices.
// ABOUTME: Injectable so headless runs and tests can script the answers.

use async_trait::async_trait;
use std::fmt;

/// A yes/no question put to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Question {
    /// Login-screen exit while instruments are still testing.
    InstrumentsRunning,
    /// Main-screen exit after one or more maintenance runs failed.
    MaintenanceFailed,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Question::InstrumentsRunning => write!(f, "Instruments are still running. Exit anyway?"),
            Question::MaintenanceFailed => {
                write!(f, "Shutdown maintenance failed on some instruments. Continue exiting?")
            }
        }
    }
}

/// An informational message shown to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    ExitInProgress,
    /// The main screen may only exit when every instrument is idle or halted.
    InstrumentsNotIdle,
    MaintenanceFailed,
    ExitFailed,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::ExitInProgress => write!(f, "Exit already in progress, please wait."),
            Notice::InstrumentsNotIdle => write!(
                f,
                "The software can only exit while every instrument is in standby or halted."
            ),
            Notice::MaintenanceFailed => {
                write!(f, "Shutdown maintenance failed on some instruments.")
            }
            Notice::ExitFailed => write!(f, "Failed to exit the program."),
        }
    }
}

#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Ask a question; `true` means the operator accepted.
    async fn confirm(&self, question: Question) -> bool;

    async fn inform(&self, notice: Notice);
}

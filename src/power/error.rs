// ABOUTME: Power manager error types with SNAFU pattern.
// ABOUTME: Wraps classification, resolution and dispatch failures of an exit attempt.

use snafu::Snafu;

use crate::ports::ControlError;
use crate::types::MaintainGroupKind;

use super::classify::ClassifyError;
use super::resolver::ResolveError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PowerError {
    #[snafu(display("an exit is already in progress"))]
    Busy,

    #[snafu(display("cannot start an exit without a power-off mode"))]
    InvalidMode,

    #[snafu(display("device classification failed: {source}"))]
    Classification { source: ClassifyError },

    #[snafu(display("{command} command failed: {source}"))]
    Dispatch {
        command: &'static str,
        source: ControlError,
    },

    #[snafu(display("cannot resolve {kind} maintenance group: {source}"))]
    Resolution {
        kind: MaintainGroupKind,
        source: ResolveError,
    },

    #[snafu(display("power manager is no longer running"))]
    Closed,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerErrorKind {
    /// Another exit attempt is active.
    Busy,
    InvalidMode,
    /// The device snapshot could not be obtained or was inconsistent.
    Classification,
    /// A command could not be sent, or its maintenance group was unusable.
    Dispatch,
    /// The manager task has stopped.
    Closed,
}

impl PowerError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> PowerErrorKind {
        match self {
            PowerError::Busy => PowerErrorKind::Busy,
            PowerError::InvalidMode => PowerErrorKind::InvalidMode,
            PowerError::Classification { .. } => PowerErrorKind::Classification,
            PowerError::Dispatch { .. } | PowerError::Resolution { .. } => {
                PowerErrorKind::Dispatch
            }
            PowerError::Closed => PowerErrorKind::Closed,
        }
    }
}

impl From<ClassifyError> for PowerError {
    fn from(source: ClassifyError) -> Self {
        PowerError::Classification { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::QueryError;

    #[test]
    fn resolution_failures_count_as_dispatch() {
        let err = PowerError::Resolution {
            kind: MaintainGroupKind::Stop,
            source: ResolveError::Query(QueryError::Transport("down".into())),
        };
        assert_eq!(err.kind(), PowerErrorKind::Dispatch);
        assert!(err.to_string().contains("stop maintenance group"));
    }

    #[test]
    fn dispatch_names_the_command() {
        let err = PowerError::Dispatch {
            command: "stop-test",
            source: ControlError::Rejected("busy".into()),
        };
        assert_eq!(err.kind(), PowerErrorKind::Dispatch);
        assert!(err.to_string().starts_with("stop-test command failed"));
    }
}

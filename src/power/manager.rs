// ABOUTME: Actor task that owns the orchestrator and its cloneable handle.
// ABOUTME: Every request and bus event is serialised through one mpsc inbox.

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::ports::{BusEvent, Ports, Question};
use crate::types::{DeviceSerial, MaintainGroupKind};

use super::classify::StopMaintainOverrides;
use super::error::PowerError;
use super::mode::{PowerNotification, PowerOffMode, PowerState, StartOutcome};
use super::orchestrator::{Orchestrator, StartReply};
use super::record::DeviceRecordSet;
use super::settings::PowerSettings;

const NOTIFICATION_CAPACITY: usize = 64;

/// Which attempt-scoped bus listener an event came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Listener {
    OtherStatus,
    StandbyStatus,
    Maintain,
}

pub(crate) enum Command {
    StartExit {
        mode: PowerOffMode,
        reply: StartReply,
    },
    CancelExit {
        reply: oneshot::Sender<()>,
    },
    SetOverride {
        serial: DeviceSerial,
        kind: MaintainGroupKind,
    },
    Snapshot {
        reply: oneshot::Sender<PowerSnapshot>,
    },
    Event {
        generation: u64,
        listener: Listener,
        event: BusEvent,
    },
    SettleElapsed {
        generation: u64,
    },
    Answer {
        generation: u64,
        question: Question,
        accepted: bool,
    },
    /// Delayed power-offs drained after the settle period.
    ExitReady {
        generation: u64,
    },
}

/// Read-only copy of the orchestrator state.
#[derive(Debug, Clone)]
pub struct PowerSnapshot {
    pub state: PowerState,
    pub mode: PowerOffMode,
    pub halt: DeviceRecordSet,
    pub standby: DeviceRecordSet,
    pub other: DeviceRecordSet,
    pub overrides: StopMaintainOverrides,
    /// Question put to the operator and not yet answered.
    pub awaiting: Option<Question>,
    pub delayed_in_flight: bool,
}

pub struct PowerManager;

impl PowerManager {
    /// Start the manager task. Must be called inside a tokio runtime.
    ///
    /// The task stops once every handle has been dropped.
    pub fn spawn(ports: Ports, settings: PowerSettings) -> PowerManagerHandle {
        let (inbox, commands) = mpsc::unbounded_channel();
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let orchestrator = Orchestrator::new(ports, settings, inbox.downgrade(), notify.clone());
        tokio::spawn(run(orchestrator, commands));

        PowerManagerHandle { inbox, notify }
    }
}

async fn run(mut orchestrator: Orchestrator, mut commands: mpsc::UnboundedReceiver<Command>) {
    tracing::debug!("power manager started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::StartExit { mode, reply } => orchestrator.start_exit(mode, reply).await,
            Command::CancelExit { reply } => {
                orchestrator.cancel_exit();
                let _ = reply.send(());
            }
            Command::SetOverride { serial, kind } => orchestrator.set_override(serial, kind),
            Command::Snapshot { reply } => {
                let _ = reply.send(orchestrator.snapshot());
            }
            Command::Event {
                generation,
                listener,
                event,
            } => orchestrator.on_event(generation, listener, event).await,
            Command::SettleElapsed { generation } => orchestrator.on_settle_elapsed(generation),
            Command::Answer {
                generation,
                question,
                accepted,
            } => orchestrator.on_answer(generation, question, accepted).await,
            Command::ExitReady { generation } => orchestrator.on_exit_ready(generation).await,
        }
    }

    tracing::debug!("power manager stopped");
}

/// Cloneable entry point to the power manager.
#[derive(Clone)]
pub struct PowerManagerHandle {
    inbox: mpsc::UnboundedSender<Command>,
    notify: broadcast::Sender<PowerNotification>,
}

impl PowerManagerHandle {
    /// Begin an exit attempt and wait until its commands have been dispatched.
    ///
    /// When the operator must confirm first, this resolves once they answer
    /// or the attempt is cancelled. Other commands are served meanwhile.
    /// Completion is reported through [`subscribe`](Self::subscribe), not here.
    pub async fn start_exit(&self, mode: PowerOffMode) -> Result<StartOutcome, PowerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::StartExit { mode, reply })?;
        response.await.map_err(|_| PowerError::Closed)?
    }

    /// Abandon the current attempt, if any.
    pub async fn cancel_exit(&self) -> Result<(), PowerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::CancelExit { reply })?;
        response.await.map_err(|_| PowerError::Closed)
    }

    /// Request a different maintenance group for a device on its next exit.
    pub fn set_stop_maintain_override(
        &self,
        serial: DeviceSerial,
        kind: MaintainGroupKind,
    ) -> Result<(), PowerError> {
        self.send(Command::SetOverride { serial, kind })
    }

    pub async fn snapshot(&self) -> Result<PowerSnapshot, PowerError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        response.await.map_err(|_| PowerError::Closed)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PowerNotification> {
        self.notify.subscribe()
    }

    fn send(&self, command: Command) -> Result<(), PowerError> {
        self.inbox.send(command).map_err(|_| PowerError::Closed)
    }
}

impl std::fmt::Debug for PowerManagerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PowerManagerHandle")
            .field("closed", &self.inbox.is_closed())
            .finish()
    }
}

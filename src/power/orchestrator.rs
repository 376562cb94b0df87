// ABOUTME: Exit state machine: classify, dispatch per group, track completion, exit.
// ABOUTME: Owned by the manager task; prompts and long waits run in spawned tasks that report back.

use snafu::ResultExt;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::ports::{BusEvent, Handler, Notice, Ports, Question, Subscription, Topic};
use crate::types::{
    DeviceSerial, DeviceStatus, DeviceStatusUpdate, MaintainGroupKind, MaintainReport,
    MaintainResult,
};

use super::classify::{ClassifyError, StopMaintainOverrides, classify};
use super::delayed::DelayedPowerOff;
use super::error::{BusySnafu, DispatchSnafu, InvalidModeSnafu, PowerError, ResolutionSnafu};
use super::manager::{Command, Listener, PowerSnapshot};
use super::mode::{PowerNotification, PowerOffMode, PowerState, StartOutcome};
use super::record::{DeviceRecordSet, RecordOutcome};
use super::resolver::MaintainGroupResolver;
use super::settings::PowerSettings;

pub(crate) type StartReply = oneshot::Sender<Result<StartOutcome, PowerError>>;

/// Bus subscriptions that live for a single exit attempt.
#[derive(Debug, Default)]
struct AttemptListeners {
    other_status: Option<Subscription>,
    standby_status: Option<Subscription>,
    maintain: Option<Subscription>,
}

impl AttemptListeners {
    fn release_standby(&mut self) {
        self.standby_status = None;
        self.maintain = None;
    }

    fn release_all(&mut self) {
        self.other_status = None;
        self.release_standby();
    }
}

/// Spawned helpers of one attempt, aborted when it is cleaned up.
#[derive(Debug, Default)]
struct AttemptTasks {
    settle_timer: Option<AbortHandle>,
    question: Option<AbortHandle>,
    exit_waiter: Option<AbortHandle>,
}

impl AttemptTasks {
    fn abort_all(&mut self) {
        for task in [
            self.settle_timer.take(),
            self.question.take(),
            self.exit_waiter.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }
    }
}

pub(crate) struct Orchestrator {
    ports: Ports,
    settings: PowerSettings,
    inbox: mpsc::WeakUnboundedSender<Command>,
    notify: broadcast::Sender<PowerNotification>,

    state: PowerState,
    mode: PowerOffMode,
    /// Bumped on every cleanup; events, answers and timers tagged with an older value are dropped.
    generation: u64,

    halt: DeviceRecordSet,
    standby: DeviceRecordSet,
    other: DeviceRecordSet,

    /// Caller of `start_exit`, until the dispatch phase has an outcome.
    pending_start: Option<StartReply>,
    /// Question put to the operator whose answer has not arrived yet.
    awaiting: Option<Question>,

    overrides: StopMaintainOverrides,
    resolver: MaintainGroupResolver,
    delayed: DelayedPowerOff,
    tasks: AttemptTasks,
    listeners: AttemptListeners,
    _override_listener: Subscription,
}

impl Orchestrator {
    pub(crate) fn new(
        ports: Ports,
        settings: PowerSettings,
        inbox: mpsc::WeakUnboundedSender<Command>,
        notify: broadcast::Sender<PowerNotification>,
    ) -> Self {
        let override_inbox = inbox.clone();
        let on_override: Handler = Arc::new(move |event: &BusEvent| {
            let BusEvent::StopMaintainTypeChanged { serial, kind } = event else {
                return;
            };
            if let Some(tx) = override_inbox.upgrade() {
                let _ = tx.send(Command::SetOverride {
                    serial: serial.clone(),
                    kind: *kind,
                });
            }
        });
        let override_listener = Subscription::new(
            Arc::clone(&ports.bus),
            Topic::StopMaintainTypeChanged,
            on_override,
        );

        let delayed = DelayedPowerOff::new(Arc::clone(&ports.control), settings.post_power_off);

        Self {
            ports,
            settings,
            inbox,
            notify,
            state: PowerState::Idle,
            mode: PowerOffMode::Invalid,
            generation: 0,
            halt: DeviceRecordSet::new(),
            standby: DeviceRecordSet::new(),
            other: DeviceRecordSet::new(),
            pending_start: None,
            awaiting: None,
            overrides: StopMaintainOverrides::new(),
            resolver: MaintainGroupResolver::new(),
            delayed,
            tasks: AttemptTasks::default(),
            listeners: AttemptListeners::default(),
            _override_listener: override_listener,
        }
    }

    /// Begin an attempt. `reply` is answered once dispatch has an outcome,
    /// which may be after an operator confirmation handled by a later command.
    pub(crate) async fn start_exit(&mut self, mode: PowerOffMode, reply: StartReply) {
        if self.state != PowerState::Idle {
            tracing::warn!(state = ?self.state, current = %self.mode, requested = %mode, "exit already in progress");
            self.inform(Notice::ExitInProgress);
            let _ = reply.send(BusySnafu.fail());
            return;
        }
        if mode == PowerOffMode::Invalid {
            let _ = reply.send(InvalidModeSnafu.fail());
            return;
        }

        tracing::info!(%mode, generation = self.generation, "starting exit");
        self.state = PowerState::Running;
        self.mode = mode;
        self.pending_start = Some(reply);
        self.resolver.clear();
        self.emit(PowerNotification::Started { mode });

        if let Err(e) = self.classify_devices().await {
            self.fail_attempt(e);
            return;
        }

        match mode {
            PowerOffMode::LoginScreenExit if !self.other.is_empty() => {
                self.ask(Question::InstrumentsRunning);
            }
            PowerOffMode::LoginScreenExit => self.dispatch_login().await,
            PowerOffMode::MainScreenExit if !self.other.is_empty() => {
                tracing::warn!(running = self.other.len(), "main screen exit refused, instruments not idle");
                self.inform(Notice::InstrumentsNotIdle);
                self.cancel_with(StartOutcome::Refused);
            }
            PowerOffMode::MainScreenExit => {
                let result = self.hand_standby().await;
                self.finish_dispatch(result);
            }
            PowerOffMode::Invalid => self.fail_attempt(PowerError::InvalidMode),
        }
    }

    async fn dispatch_login(&mut self) {
        let result = self.hand_login().await;
        self.finish_dispatch(result);
    }

    async fn hand_login(&mut self) -> Result<(), PowerError> {
        self.hand_halt().await?;
        self.hand_other().await?;
        self.hand_standby().await
    }

    fn finish_dispatch(&mut self, result: Result<(), PowerError>) {
        match result {
            Ok(()) => {
                self.process_check();
                self.reply_start(Ok(StartOutcome::Dispatched));
            }
            Err(e) => self.fail_attempt(e),
        }
    }

    fn fail_attempt(&mut self, error: PowerError) {
        tracing::error!(error = %error, mode = %self.mode, "exit attempt failed");
        let reply = self.pending_start.take();
        self.clean_before_quit();
        self.emit(PowerNotification::ExitFailed {
            reason: error.to_string(),
        });
        self.inform(Notice::ExitFailed);
        if let Some(reply) = reply {
            let _ = reply.send(Err(error));
        }
    }

    fn reply_start(&mut self, outcome: Result<StartOutcome, PowerError>) {
        if let Some(reply) = self.pending_start.take() {
            let _ = reply.send(outcome);
        }
    }

    async fn classify_devices(&mut self) -> Result<(), PowerError> {
        let devices = self
            .ports
            .directory
            .list_devices()
            .await
            .map_err(ClassifyError::from)?;
        let sets = classify(&devices, self.mode, self.settings.classifier, &self.overrides)?;

        self.halt = sets.halt;
        self.standby = sets.standby;
        self.other = sets.other;
        Ok(())
    }

    /// Force off halted devices. The command reply only means "accepted",
    /// so the set is finished as soon as it is sent.
    async fn hand_halt(&mut self) -> Result<(), PowerError> {
        if self.halt.is_empty() {
            return Ok(());
        }

        let serials = self.halt.serials();
        tracing::info!(devices = serials.len(), "powering off halted devices");
        self.ports
            .control
            .power_off(&serials)
            .await
            .context(DispatchSnafu { command: "power-off" })?;
        self.halt.record_all();
        Ok(())
    }

    async fn hand_other(&mut self) -> Result<(), PowerError> {
        if self.other.is_empty() {
            return Ok(());
        }

        self.listeners.other_status =
            Some(self.listen(Topic::DeviceStatusChanged, Listener::OtherStatus));

        tracing::info!(devices = self.other.len(), "stopping running devices");
        self.ports
            .control
            .stop_test()
            .await
            .context(DispatchSnafu { command: "stop-test" })
    }

    /// Resolve a group for every maintenance kind, then dispatch one command
    /// per kind. Nothing is sent unless every kind resolved.
    async fn hand_standby(&mut self) -> Result<(), PowerError> {
        if self.standby.is_empty() {
            return Ok(());
        }

        let by_kind = self.standby.group_by_kind();
        self.listeners.maintain = Some(self.listen(Topic::MaintainGroupUpdated, Listener::Maintain));
        self.listeners.standby_status =
            Some(self.listen(Topic::DeviceStatusChanged, Listener::StandbyStatus));

        let mut plan = Vec::with_capacity(by_kind.len());
        for (kind, serials) in by_kind {
            let group = self
                .resolver
                .resolve(&*self.ports.groups, kind)
                .await
                .context(ResolutionSnafu { kind })?;
            plan.push((group, serials));
        }

        let mut no_op = Vec::new();
        for (group, serials) in plan {
            if group.items.is_empty() {
                no_op.extend(serials);
                continue;
            }

            tracing::info!(group = %group.id, kind = %group.kind, devices = serials.len(), "running shutdown maintenance");
            self.ports
                .control
                .run_maintenance(group.id, &serials)
                .await
                .context(DispatchSnafu {
                    command: "run-maintenance",
                })?;
        }

        if !no_op.is_empty() {
            tracing::info!(devices = no_op.len(), "maintenance group is empty, skipping to power-off");
            for serial in &no_op {
                self.standby.record(serial);
            }
            self.delayed.schedule(no_op, self.settings.delayed_power_off);
            if self.standby.is_finished() {
                self.standby_finished();
            }
        }
        Ok(())
    }

    fn listen(&self, topic: Topic, listener: Listener) -> Subscription {
        let inbox = self.inbox.clone();
        let generation = self.generation;
        let handler: Handler = Arc::new(move |event: &BusEvent| {
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Command::Event {
                    generation,
                    listener,
                    event: event.clone(),
                });
            }
        });
        Subscription::new(Arc::clone(&self.ports.bus), topic, handler)
    }

    pub(crate) async fn on_event(&mut self, generation: u64, listener: Listener, event: BusEvent) {
        if generation != self.generation {
            tracing::trace!(generation, current = self.generation, ?listener, "dropping event from a previous attempt");
            return;
        }

        match (listener, event) {
            (Listener::OtherStatus, BusEvent::DeviceStatusChanged(update)) => {
                self.on_other_status(update).await
            }
            (Listener::StandbyStatus, BusEvent::DeviceStatusChanged(update)) => {
                self.on_standby_status(update)
            }
            (Listener::Maintain, BusEvent::MaintainGroupUpdated(report)) => {
                self.on_maintain_update(report)
            }
            (listener, event) => {
                tracing::trace!(?listener, topic = %event.topic(), "event not handled by listener");
            }
        }
    }

    async fn on_other_status(&mut self, update: DeviceStatusUpdate) {
        let Some(status) = update.status else {
            return;
        };
        if !status.is_stopped() {
            return;
        }

        match self.other.record(&update.serial) {
            RecordOutcome::Ignored => {
                tracing::trace!(serial = %update.serial, "status update ignored");
            }
            RecordOutcome::Recorded => {
                tracing::debug!(serial = %update.serial, %status, finished = self.other.finished_count(), total = self.other.len(), "device stopped");
            }
            RecordOutcome::Completed => {
                tracing::debug!(serial = %update.serial, %status, "device stopped");
                self.other_finished().await;
            }
        }
    }

    async fn other_finished(&mut self) {
        tracing::info!(devices = self.other.len(), "all running devices stopped");
        self.listeners.other_status = None;

        // stop-test alone does not always power the instrument down
        let serials = self.other.serials();
        if let Err(e) = self.ports.control.power_off(&serials).await {
            tracing::warn!(error = %e, devices = serials.len(), "power-off after stop failed");
        }
        self.process_check();
    }

    fn on_maintain_update(&mut self, report: MaintainReport) {
        if report.result == MaintainResult::Executing {
            return;
        }
        if self.standby.is_finished()
            || !self.standby.contains(&report.serial)
            || self.standby.is_recorded(&report.serial)
        {
            tracing::trace!(serial = %report.serial, "maintenance update ignored");
            return;
        }

        let kind = self.standby.maintain_kind(&report.serial);
        let auto_shutdown = match self.resolver.cached(kind) {
            Some(group) if group.id == report.group_id => group.ends_with_auto_shutdown(),
            Some(group) => {
                tracing::debug!(serial = %report.serial, expected = %group.id, reported = %report.group_id, "stale maintenance update");
                return;
            }
            None => {
                tracing::debug!(serial = %report.serial, %kind, "no resolved group for maintenance update");
                return;
            }
        };

        let outcome = match report.result {
            MaintainResult::Success => {
                tracing::info!(serial = %report.serial, "maintenance finished");
                let outcome = self.standby.record(&report.serial);
                if !auto_shutdown {
                    self.delayed
                        .schedule(vec![report.serial.clone()], self.settings.delayed_power_off);
                }
                outcome
            }
            MaintainResult::Fail => {
                tracing::warn!(serial = %report.serial, "maintenance failed");
                self.standby.record_failure(&report.serial)
            }
            MaintainResult::Executing => return,
        };

        if outcome == RecordOutcome::Completed {
            self.standby_finished();
        }
    }

    fn on_standby_status(&mut self, update: DeviceStatusUpdate) {
        if update.status != Some(DeviceStatus::Disconnected) {
            return;
        }

        if self.standby.record_failure(&update.serial) != RecordOutcome::Ignored {
            tracing::warn!(serial = %update.serial, "device disconnected before finishing maintenance");
            if self.standby.is_finished() {
                self.standby_finished();
            }
        }
    }

    fn standby_finished(&mut self) {
        self.listeners.release_standby();

        let failed = self.standby.failed().to_vec();
        if failed.is_empty() {
            tracing::info!(devices = self.standby.len(), "shutdown maintenance complete");
            self.process_check();
            return;
        }

        tracing::warn!(failed = failed.len(), total = self.standby.len(), "shutdown maintenance failed on some devices");
        // Login-screen exits only inform; main-screen exits ask to continue.
        match self.mode {
            PowerOffMode::MainScreenExit => self.ask(Question::MaintenanceFailed),
            _ => {
                self.inform(Notice::MaintenanceFailed);
                self.continue_after_failures();
            }
        }
    }

    fn continue_after_failures(&mut self) {
        let failed = self.standby.failed().to_vec();
        self.delayed.schedule(failed, self.settings.delayed_power_off);
        self.process_check();
    }

    /// Put a question to the operator without blocking the manager.
    ///
    /// The answer comes back as [`Command::Answer`] tagged with the current generation.
    fn ask(&mut self, question: Question) {
        tracing::debug!(?question, "asking operator");
        self.awaiting = Some(question);

        let prompt = Arc::clone(&self.ports.prompt);
        let inbox = self.inbox.clone();
        let generation = self.generation;
        let task = tokio::spawn(async move {
            let accepted = prompt.confirm(question).await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Command::Answer {
                    generation,
                    question,
                    accepted,
                });
            }
        });
        self.tasks.question = Some(task.abort_handle());
    }

    fn inform(&self, notice: Notice) {
        let prompt = Arc::clone(&self.ports.prompt);
        tokio::spawn(async move { prompt.inform(notice).await });
    }

    pub(crate) async fn on_answer(&mut self, generation: u64, question: Question, accepted: bool) {
        if generation != self.generation || self.awaiting != Some(question) {
            tracing::trace!(generation, ?question, "dropping stale answer");
            return;
        }
        self.awaiting = None;
        self.tasks.question = None;
        tracing::info!(?question, accepted, "operator answered");

        match (question, accepted) {
            (Question::InstrumentsRunning, true) => self.dispatch_login().await,
            (Question::InstrumentsRunning, false) => {
                tracing::info!(running = self.other.len(), "operator declined to stop running instruments");
                self.cancel_with(StartOutcome::Declined);
            }
            (Question::MaintenanceFailed, true) => self.continue_after_failures(),
            (Question::MaintenanceFailed, false) => {
                tracing::info!("operator aborted exit after maintenance failure");
                self.cancel_exit();
            }
        }
    }

    fn process_check(&mut self) {
        if self.state != PowerState::Running && self.state != PowerState::AwaitingSettle {
            return;
        }
        if self.awaiting.is_some() {
            tracing::debug!(question = ?self.awaiting, "waiting for operator");
            return;
        }
        if !(self.halt.is_finished() && self.standby.is_finished() && self.other.is_finished()) {
            tracing::debug!(
                halt = self.halt.is_finished(),
                standby = self.standby.is_finished(),
                other = self.other.is_finished(),
                "waiting for devices"
            );
            return;
        }

        if self.state != PowerState::AwaitingSettle {
            tracing::info!(settle = ?self.settings.settle, "all devices finished, settling");
            self.state = PowerState::AwaitingSettle;
            self.emit(PowerNotification::Settling);
        }
        self.arm_settle_timer();
    }

    fn arm_settle_timer(&mut self) {
        if let Some(timer) = self.tasks.settle_timer.take() {
            timer.abort();
        }

        let inbox = self.inbox.clone();
        let generation = self.generation;
        let settle = self.settings.settle;
        let task = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Command::SettleElapsed { generation });
            }
        });
        self.tasks.settle_timer = Some(task.abort_handle());
    }

    /// Settle period over: wait for delayed power-offs off the manager task.
    pub(crate) fn on_settle_elapsed(&mut self, generation: u64) {
        if generation != self.generation || self.state != PowerState::AwaitingSettle {
            tracing::trace!(generation, "stale settle timer");
            return;
        }
        self.tasks.settle_timer = None;
        self.state = PowerState::Exiting;

        if self.delayed.is_in_flight() {
            tracing::info!("waiting for delayed power-off");
        }
        let drained = self.delayed.drained();
        let inbox = self.inbox.clone();
        let task = tokio::spawn(async move {
            drained.await;
            if let Some(tx) = inbox.upgrade() {
                let _ = tx.send(Command::ExitReady { generation });
            }
        });
        self.tasks.exit_waiter = Some(task.abort_handle());
    }

    pub(crate) async fn on_exit_ready(&mut self, generation: u64) {
        if generation != self.generation || self.state != PowerState::Exiting {
            tracing::trace!(generation, "stale exit waiter");
            return;
        }
        self.tasks.exit_waiter = None;

        let mode = self.mode;
        self.clean_before_quit();
        self.quit_system(mode).await;
    }

    async fn quit_system(&self, mode: PowerOffMode) {
        tracing::info!(%mode, "ready to exit");
        self.emit(PowerNotification::ReadyToExit { mode });

        if mode == PowerOffMode::MainScreenExit {
            match self.ports.user.current() {
                Some(user) if user.requires_os_shutdown() => {
                    tracing::info!(user = %user.name, delay = ?self.settings.os_shutdown_delay, "scheduling OS shutdown");
                    if let Err(e) = self
                        .ports
                        .gate
                        .schedule_os_shutdown(self.settings.os_shutdown_delay)
                        .await
                    {
                        tracing::error!(error = %e, "failed to schedule OS shutdown");
                    }
                }
                Some(user) => {
                    tracing::info!(user = %user.name, privilege = ?user.privilege, "privileged user, leaving OS running");
                }
                None => {
                    tracing::error!("no logged-in user, skipping OS shutdown");
                }
            }
        }

        self.ports.gate.terminate(mode);
    }

    /// Return to idle without terminating. Safe from any state.
    ///
    /// A `start_exit` still waiting on the operator is answered with
    /// [`StartOutcome::Cancelled`].
    pub(crate) fn cancel_exit(&mut self) {
        self.cancel_with(StartOutcome::Cancelled);
    }

    fn cancel_with(&mut self, outcome: StartOutcome) {
        tracing::info!(state = ?self.state, mode = %self.mode, ?outcome, "cancelling exit");
        let reply = self.pending_start.take();
        self.clean_before_quit();
        self.emit(PowerNotification::Cancelled);
        if let Some(reply) = reply {
            let _ = reply.send(Ok(outcome));
        }
    }

    /// Reset attempt state. Overrides and scheduled power-offs are kept.
    fn clean_before_quit(&mut self) {
        tracing::debug!(generation = self.generation, "cleaning up exit attempt");
        self.generation += 1;
        self.mode = PowerOffMode::Invalid;
        self.state = PowerState::Idle;
        self.awaiting = None;
        self.halt.reset();
        self.standby.reset();
        self.other.reset();
        self.resolver.clear();
        self.tasks.abort_all();
        self.listeners.release_all();
    }

    /// Takes effect at the next classification.
    pub(crate) fn set_override(&mut self, serial: DeviceSerial, kind: MaintainGroupKind) {
        tracing::debug!(%serial, %kind, "stop maintenance override");
        self.overrides.insert(serial, kind);
    }

    pub(crate) fn snapshot(&self) -> PowerSnapshot {
        PowerSnapshot {
            state: self.state,
            mode: self.mode,
            halt: self.halt.clone(),
            standby: self.standby.clone(),
            other: self.other.clone(),
            overrides: self.overrides.clone(),
            awaiting: self.awaiting,
            delayed_in_flight: self.delayed.is_in_flight(),
        }
    }

    fn emit(&self, notification: PowerNotification) {
        tracing::trace!(?notification, "notify");
        // no receivers is fine
        let _ = self.notify.send(notification);
    }
}

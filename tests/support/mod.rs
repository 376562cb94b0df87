// ABOUTME: Test support utilities.
// ABOUTME: Scripted prompt, recording exit gate and a harness around a simulated fleet.

use async_trait::async_trait;
use fleetdown::ports::{
    ExitGate, ExitGateError, FixedUser, LocalBus, Notice, Ports, Question, UserPrompt,
};
use fleetdown::power::{
    PowerManager, PowerManagerHandle, PowerNotification, PowerOffMode, PowerSettings,
    PowerSnapshot,
};
use fleetdown::sim::{DeviceSpec, FleetSpec, GroupSpec, SimBehavior, SimFleet};
use fleetdown::types::{
    DeviceKind, DeviceSerial, DeviceStatus, MaintainGroupId, MaintainGroupKind, MaintainItemKind,
    UserInfo,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::{Notify, broadcast};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("fleetdown=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[allow(dead_code)]
pub fn serial(s: &str) -> DeviceSerial {
    DeviceSerial::new(s).unwrap()
}

#[allow(dead_code)]
pub fn serials(names: &[&str]) -> Vec<DeviceSerial> {
    names.iter().map(|n| serial(n)).collect()
}

#[allow(dead_code)]
pub fn device(name: &str, kind: DeviceKind, status: DeviceStatus) -> DeviceSpec {
    DeviceSpec::new(serial(name), kind, status)
}

#[allow(dead_code)]
pub fn group(id: i64, kind: MaintainGroupKind, items: &[MaintainItemKind]) -> GroupSpec {
    GroupSpec {
        id: MaintainGroupId::new(id),
        kind,
        items: items.to_vec(),
    }
}

/// Answers questions from a script, then with a fixed default.
///
/// A gated prompt holds every answer until its release handle is notified,
/// like an operator who has not looked at the screen yet.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<bool>>,
    default_answer: bool,
    questions: Mutex<Vec<Question>>,
    notices: Mutex<Vec<Notice>>,
    posted: Notify,
    release: Option<Arc<Notify>>,
}

#[allow(dead_code)]
impl ScriptedPrompt {
    pub fn always(answer: bool) -> Self {
        Self {
            default_answer: answer,
            ..Self::default()
        }
    }

    pub fn scripted(answers: &[bool], default_answer: bool) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            default_answer,
            ..Self::default()
        }
    }

    /// Answers with `answer` once the returned handle is notified, one permit per question.
    pub fn gated(answer: bool) -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let prompt = Self {
            default_answer: answer,
            release: Some(Arc::clone(&release)),
            ..Self::default()
        };
        (prompt, release)
    }

    pub fn questions(&self) -> Vec<Question> {
        self.questions.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Wait until at least `count` notices arrived. Notices are delivered
    /// off the manager task, so they can trail the call that caused them.
    pub async fn wait_notices(&self, count: usize) -> Vec<Notice> {
        self.wait_until(|p| p.notices.lock().len() >= count).await;
        self.notices()
    }

    /// Wait until at least `count` questions were asked.
    pub async fn wait_questions(&self, count: usize) -> Vec<Question> {
        self.wait_until(|p| p.questions.lock().len() >= count).await;
        self.questions()
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        tokio::time::timeout(Duration::from_secs(3600), async {
            loop {
                let posted = self.posted.notified();
                if done(self) {
                    return;
                }
                posted.await;
            }
        })
        .await
        .expect("timed out waiting for prompt");
    }
}

#[async_trait]
impl UserPrompt for ScriptedPrompt {
    async fn confirm(&self, question: Question) -> bool {
        self.questions.lock().push(question);
        self.posted.notify_waiters();
        if let Some(release) = &self.release {
            release.notified().await;
        }
        self.answers
            .lock()
            .pop_front()
            .unwrap_or(self.default_answer)
    }

    async fn inform(&self, notice: Notice) {
        self.notices.lock().push(notice);
        self.posted.notify_waiters();
    }
}

/// Exit gate that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingGate {
    os_shutdowns: Mutex<Vec<Duration>>,
    terminations: Mutex<Vec<PowerOffMode>>,
}

#[allow(dead_code)]
impl RecordingGate {
    pub fn os_shutdowns(&self) -> Vec<Duration> {
        self.os_shutdowns.lock().clone()
    }

    pub fn terminations(&self) -> Vec<PowerOffMode> {
        self.terminations.lock().clone()
    }
}

#[async_trait]
impl ExitGate for RecordingGate {
    async fn schedule_os_shutdown(&self, delay: Duration) -> Result<(), ExitGateError> {
        self.os_shutdowns.lock().push(delay);
        Ok(())
    }

    fn terminate(&self, mode: PowerOffMode) {
        self.terminations.lock().push(mode);
    }
}

pub struct HarnessBuilder {
    fleet: FleetSpec,
    behavior: SimBehavior,
    prompt: ScriptedPrompt,
    user: Option<UserInfo>,
    settings: PowerSettings,
}

#[allow(dead_code)]
impl HarnessBuilder {
    pub fn device(mut self, device: DeviceSpec) -> Self {
        self.fleet.devices.push(device);
        self
    }

    pub fn group(mut self, group: GroupSpec) -> Self {
        self.fleet.groups.push(group);
        self
    }

    /// A valid shutdown group: reset first, auto-shutdown last.
    pub fn stop_group(self, id: i64) -> Self {
        self.group(group(
            id,
            MaintainGroupKind::Stop,
            &[MaintainItemKind::Reset, MaintainItemKind::AutoShutdown],
        ))
    }

    pub fn behavior(mut self, behavior: SimBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn prompt(mut self, prompt: ScriptedPrompt) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn user(mut self, user: UserInfo) -> Self {
        self.user = Some(user);
        self
    }

    pub fn settings(mut self, settings: PowerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Harness {
        init_tracing();

        let bus = Arc::new(LocalBus::new());
        let fleet = SimFleet::new(self.fleet, self.behavior, Arc::clone(&bus));
        let prompt = Arc::new(self.prompt);
        let gate = Arc::new(RecordingGate::default());
        let user = match self.user {
            Some(user) => FixedUser::new(user),
            None => FixedUser::nobody(),
        };

        let ports = Ports {
            directory: fleet.clone(),
            control: fleet.clone(),
            groups: fleet.clone(),
            bus: bus.clone(),
            prompt: prompt.clone(),
            user: Arc::new(user),
            gate: gate.clone(),
        };
        let manager = PowerManager::spawn(ports, self.settings);
        let notifications = manager.subscribe();

        Harness {
            fleet,
            bus,
            prompt,
            gate,
            manager,
            notifications,
        }
    }
}

pub struct Harness {
    pub fleet: Arc<SimFleet>,
    pub bus: Arc<LocalBus>,
    pub prompt: Arc<ScriptedPrompt>,
    pub gate: Arc<RecordingGate>,
    pub manager: PowerManagerHandle,
    pub notifications: broadcast::Receiver<PowerNotification>,
}

#[allow(dead_code)]
impl Harness {
    /// Manual fleet, accepting prompt, no user, default timings.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            fleet: FleetSpec::default(),
            behavior: SimBehavior::manual(),
            prompt: ScriptedPrompt::always(true),
            user: None,
            settings: PowerSettings::default(),
        }
    }

    /// Snapshot after every queued event has been handled.
    pub async fn snapshot(&self) -> PowerSnapshot {
        self.manager.snapshot().await.unwrap()
    }

    /// Receive notifications until one matches, returning everything seen.
    pub async fn wait_for(
        &mut self,
        matches: impl Fn(&PowerNotification) -> bool,
    ) -> Vec<PowerNotification> {
        let mut seen = Vec::new();
        loop {
            let next = tokio::time::timeout(Duration::from_secs(3600), self.notifications.recv())
                .await
                .expect("timed out waiting for notification")
                .expect("notification channel closed");
            let done = matches(&next);
            seen.push(next);
            if done {
                return seen;
            }
        }
    }

    pub async fn wait_ready(&mut self) -> Vec<PowerNotification> {
        let seen = self
            .wait_for(|n| matches!(n, PowerNotification::ReadyToExit { .. }))
            .await;
        // let the manager finish quit_system before callers inspect the gate
        self.snapshot().await;
        seen
    }

    /// Notifications already delivered, without waiting.
    pub fn drain(&mut self) -> Vec<PowerNotification> {
        let mut seen = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            seen.push(n);
        }
        seen
    }
}

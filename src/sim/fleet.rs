// ABOUTME: In-memory instrument fleet implementing the directory, control and group ports.
// ABOUTME: Records every command and, optionally, answers with the bus events a real fleet would send.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::ports::{
    BusEvent, ControlError, ControlProxy, DeviceDirectory, DirectoryError, LocalBus,
    MaintainGroupDirectory, QueryError,
};
use crate::types::{
    DeviceInfo, DeviceKind, DeviceSerial, DeviceStatus, DeviceStatusUpdate, MaintainGroup,
    MaintainGroupId, MaintainGroupKind, MaintainItemKind, MaintainReport, MaintainResult,
};

/// How a simulated device answers a maintenance request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintainBehavior {
    #[default]
    Success,
    Fail,
    /// Never reports back.
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceSpec {
    pub serial: DeviceSerial,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    #[serde(default)]
    pub maintain: MaintainBehavior,
}

impl DeviceSpec {
    pub fn new(serial: DeviceSerial, kind: DeviceKind, status: DeviceStatus) -> Self {
        Self {
            serial,
            kind,
            status,
            maintain: MaintainBehavior::default(),
        }
    }

    pub fn with_maintain(mut self, maintain: MaintainBehavior) -> Self {
        self.maintain = maintain;
        self
    }

    pub fn info(&self) -> DeviceInfo {
        DeviceInfo::new(self.serial.clone(), self.kind, self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSpec {
    pub id: MaintainGroupId,
    #[serde(default)]
    pub kind: MaintainGroupKind,
    #[serde(default)]
    pub items: Vec<MaintainItemKind>,
}

impl From<GroupSpec> for MaintainGroup {
    fn from(spec: GroupSpec) -> Self {
        MaintainGroup::new(spec.id, spec.kind, spec.items)
    }
}

/// Contents of a fleet file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetSpec {
    #[serde(default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

impl FleetSpec {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FleetRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| Error::FleetParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn device_infos(&self) -> Vec<DeviceInfo> {
        self.devices.iter().map(DeviceSpec::info).collect()
    }
}

/// Switches that shape how the simulated backend answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimBehavior {
    /// Publish the events a real fleet would send in reply to commands.
    pub auto_respond: bool,
    /// Delay before replies are published. Zero publishes inline.
    pub response_delay: Duration,
    pub fail_stop_test: bool,
    pub fail_maintenance: bool,
    pub fail_power_off: bool,
    pub directory_unavailable: bool,
}

impl Default for SimBehavior {
    fn default() -> Self {
        Self {
            auto_respond: true,
            response_delay: Duration::from_millis(200),
            fail_stop_test: false,
            fail_maintenance: false,
            fail_power_off: false,
            directory_unavailable: false,
        }
    }
}

impl SimBehavior {
    /// Record commands without answering them.
    pub fn manual() -> Self {
        Self {
            auto_respond: false,
            response_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// A command received by the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    StopTest,
    RunMaintenance {
        group: MaintainGroupId,
        devices: Vec<DeviceSerial>,
    },
    PowerOff {
        devices: Vec<DeviceSerial>,
    },
}

#[derive(Debug)]
struct FleetState {
    devices: Vec<DeviceSpec>,
    groups: Vec<MaintainGroup>,
    calls: Vec<ControlCall>,
    queries: usize,
}

pub struct SimFleet {
    this: Weak<SimFleet>,
    bus: Arc<LocalBus>,
    behavior: Mutex<SimBehavior>,
    state: Mutex<FleetState>,
}

impl SimFleet {
    pub fn new(spec: FleetSpec, behavior: SimBehavior, bus: Arc<LocalBus>) -> Arc<Self> {
        let state = FleetState {
            devices: spec.devices,
            groups: spec.groups.into_iter().map(MaintainGroup::from).collect(),
            calls: Vec::new(),
            queries: 0,
        };
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            bus,
            behavior: Mutex::new(behavior),
            state: Mutex::new(state),
        })
    }

    pub fn behavior(&self) -> SimBehavior {
        *self.behavior.lock()
    }

    pub fn update_behavior(&self, f: impl FnOnce(&mut SimBehavior)) {
        f(&mut self.behavior.lock());
    }

    /// Every command received so far, oldest first.
    pub fn calls(&self) -> Vec<ControlCall> {
        self.state.lock().calls.clone()
    }

    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    pub fn status(&self, serial: &DeviceSerial) -> Option<DeviceStatus> {
        self.state
            .lock()
            .devices
            .iter()
            .find(|d| &d.serial == serial)
            .map(|d| d.status)
    }

    /// Replace the maintenance group definitions.
    pub fn set_groups(&self, groups: Vec<MaintainGroup>) {
        self.state.lock().groups = groups;
    }

    /// Change a device's status and publish the change.
    pub fn set_status(&self, serial: &DeviceSerial, status: DeviceStatus) {
        {
            let mut state = self.state.lock();
            if let Some(device) = state.devices.iter_mut().find(|d| &d.serial == serial) {
                device.status = status;
            }
        }
        self.bus.publish(BusEvent::DeviceStatusChanged(DeviceStatusUpdate::new(
            serial.clone(),
            status,
        )));
    }

    pub fn report_maintenance(
        &self,
        serial: &DeviceSerial,
        group_id: MaintainGroupId,
        result: MaintainResult,
    ) {
        self.bus.publish(BusEvent::MaintainGroupUpdated(MaintainReport {
            serial: serial.clone(),
            group_id,
            result,
        }));
    }

    /// Publish a device's request for a different maintenance group.
    pub fn request_stop_maintain(&self, serial: &DeviceSerial, kind: MaintainGroupKind) {
        self.bus.publish(BusEvent::StopMaintainTypeChanged {
            serial: serial.clone(),
            kind,
        });
    }

    fn record(&self, call: ControlCall) {
        tracing::debug!(?call, "sim command");
        self.state.lock().calls.push(call);
    }

    /// Run `respond` now or after the configured delay, if auto-responding.
    fn respond_later(&self, respond: impl FnOnce(&SimFleet) + Send + 'static) {
        let behavior = self.behavior();
        if !behavior.auto_respond {
            return;
        }
        if behavior.response_delay.is_zero() {
            respond(self);
            return;
        }

        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::time::sleep(behavior.response_delay).await;
            if let Some(fleet) = this.upgrade() {
                respond(&fleet);
            }
        });
    }

    fn running_devices(&self) -> Vec<DeviceSerial> {
        self.state
            .lock()
            .devices
            .iter()
            .filter(|d| !d.status.is_stopped() && d.status != DeviceStatus::Disconnected)
            .map(|d| d.serial.clone())
            .collect()
    }

    fn maintain_plan(
        &self,
        group: MaintainGroupId,
        devices: &[DeviceSerial],
    ) -> (bool, Vec<(DeviceSerial, MaintainBehavior)>) {
        let state = self.state.lock();
        let auto_shutdown = state
            .groups
            .iter()
            .find(|g| g.id == group)
            .is_some_and(MaintainGroup::ends_with_auto_shutdown);
        let plan = devices
            .iter()
            .filter_map(|serial| {
                state
                    .devices
                    .iter()
                    .find(|d| &d.serial == serial)
                    .map(|d| (d.serial.clone(), d.maintain))
            })
            .collect();
        (auto_shutdown, plan)
    }
}

impl std::fmt::Debug for SimFleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SimFleet")
            .field("devices", &state.devices.len())
            .field("groups", &state.groups.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

#[async_trait]
impl DeviceDirectory for SimFleet {
    async fn list_devices(&self) -> std::result::Result<Vec<DeviceInfo>, DirectoryError> {
        if self.behavior().directory_unavailable {
            return Err(DirectoryError::Unavailable("simulated outage".to_string()));
        }
        Ok(self.state.lock().devices.iter().map(DeviceSpec::info).collect())
    }
}

#[async_trait]
impl MaintainGroupDirectory for SimFleet {
    async fn query(
        &self,
        kind: MaintainGroupKind,
    ) -> std::result::Result<Vec<MaintainGroup>, QueryError> {
        let mut state = self.state.lock();
        state.queries += 1;
        Ok(state
            .groups
            .iter()
            .filter(|g| g.kind == kind)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ControlProxy for SimFleet {
    async fn stop_test(&self) -> std::result::Result<(), ControlError> {
        self.record(ControlCall::StopTest);
        if self.behavior().fail_stop_test {
            return Err(ControlError::Rejected("stop test refused".to_string()));
        }

        let running = self.running_devices();
        self.respond_later(move |fleet| {
            for serial in &running {
                fleet.set_status(serial, DeviceStatus::Standby);
            }
        });
        Ok(())
    }

    async fn run_maintenance(
        &self,
        group: MaintainGroupId,
        devices: &[DeviceSerial],
    ) -> std::result::Result<(), ControlError> {
        self.record(ControlCall::RunMaintenance {
            group,
            devices: devices.to_vec(),
        });
        if self.behavior().fail_maintenance {
            return Err(ControlError::Rejected("maintenance refused".to_string()));
        }

        let (auto_shutdown, plan) = self.maintain_plan(group, devices);
        self.respond_later(move |fleet| {
            for (serial, behavior) in &plan {
                match behavior {
                    MaintainBehavior::Success => {
                        fleet.report_maintenance(serial, group, MaintainResult::Executing);
                        fleet.report_maintenance(serial, group, MaintainResult::Success);
                        if auto_shutdown {
                            fleet.set_status(serial, DeviceStatus::Disconnected);
                        }
                    }
                    MaintainBehavior::Fail => {
                        fleet.report_maintenance(serial, group, MaintainResult::Executing);
                        fleet.report_maintenance(serial, group, MaintainResult::Fail);
                    }
                    MaintainBehavior::Silent => {}
                }
            }
        });
        Ok(())
    }

    async fn power_off(&self, devices: &[DeviceSerial]) -> std::result::Result<(), ControlError> {
        self.record(ControlCall::PowerOff {
            devices: devices.to_vec(),
        });
        if self.behavior().fail_power_off {
            return Err(ControlError::Transport("power-off lost".to_string()));
        }

        let devices = devices.to_vec();
        self.respond_later(move |fleet| {
            for serial in &devices {
                if fleet.status(serial) != Some(DeviceStatus::Disconnected) {
                    fleet.set_status(serial, DeviceStatus::Disconnected);
                }
            }
        });
        Ok(())
    }
}

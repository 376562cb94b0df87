// ABOUTME: Simulate command implementation.
// ABOUTME: Runs one exit sequence against a simulated fleet and reports its notifications.

use fleetdown::config::Config;
use fleetdown::console::ConsolePrompt;
use fleetdown::error::{Error, Result};
use fleetdown::output::Output;
use fleetdown::ports::{FixedUser, LocalBus, Ports};
use fleetdown::power::{PowerError, PowerManager, PowerNotification, PowerOffMode, StartOutcome};
use fleetdown::shutdown::SystemExitGate;
use fleetdown::sim::{FleetSpec, SimBehavior, SimFleet};
use fleetdown::types::{PrivilegeLevel, UserInfo};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone, Copy)]
pub struct SimulateOptions {
    pub mode: PowerOffMode,
    pub assume_yes: bool,
    pub user: Option<PrivilegeLevel>,
    pub allow_os_shutdown: bool,
}

/// Returns whether the sequence ended with the application terminating.
pub async fn simulate(
    config: Config,
    fleet: &Path,
    options: SimulateOptions,
    mut output: Output,
) -> Result<bool> {
    output.start_timer();

    let spec = FleetSpec::load(fleet)?;
    output.progress(&format!(
        "Simulating {} exit for {} device(s)",
        options.mode,
        spec.devices.len()
    ));

    let bus = Arc::new(LocalBus::new());
    let sim = SimFleet::new(spec, SimBehavior::default(), Arc::clone(&bus));
    let gate = Arc::new(SystemExitGate::new(
        config.os_shutdown.clone(),
        options.allow_os_shutdown,
    ));
    let user = match options.user {
        Some(level) => FixedUser::new(UserInfo::new("operator", level)),
        None => FixedUser::nobody(),
    };

    let ports = Ports {
        directory: sim.clone(),
        control: sim.clone(),
        groups: sim,
        bus,
        prompt: Arc::new(ConsolePrompt::new(options.assume_yes)),
        user: Arc::new(user),
        gate: gate.clone(),
    };
    let manager = PowerManager::spawn(ports, config.power_settings());
    let mut notifications = manager.subscribe();

    match manager.start_exit(options.mode).await? {
        StartOutcome::Dispatched => {}
        StartOutcome::Declined => {
            output.success("Exit declined, instruments left running");
            return Ok(false);
        }
        StartOutcome::Refused => {
            output.success("Exit refused, instruments are not idle");
            return Ok(false);
        }
        StartOutcome::Cancelled => {
            output.success("Exit cancelled before dispatch");
            return Ok(false);
        }
    }

    loop {
        tokio::select! {
            received = notifications.recv() => match received {
                Ok(notification) => {
                    output.notification(&notification);
                    match notification {
                        PowerNotification::ReadyToExit { .. } => break,
                        PowerNotification::Cancelled | PowerNotification::ExitFailed { .. } => {
                            return Ok(false);
                        }
                        PowerNotification::Started { .. } | PowerNotification::Settling => {}
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "notifications dropped");
                }
                Err(RecvError::Closed) => return Err(Error::Power(PowerError::Closed)),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, cancelling exit");
                manager.cancel_exit().await?;
            }
        }
    }

    let mode = gate.wait_terminated().await;
    if let Some(command) = gate.last_command() {
        let verb = if options.allow_os_shutdown {
            "Scheduled"
        } else {
            "Would schedule"
        };
        output.progress(&format!("{verb} OS shutdown: {}", command.join(" ")));
    }
    output.success(&format!("Fleet powered off, exiting ({mode})"));
    Ok(true)
}

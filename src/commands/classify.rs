// ABOUTME: Classify command implementation.
// ABOUTME: Prints the halt, standby and other groups of a fleet file.

use fleetdown::config::Config;
use fleetdown::error::Result;
use fleetdown::output::Output;
use fleetdown::power::{PowerOffMode, StopMaintainOverrides, classify};
use fleetdown::sim::FleetSpec;
use std::path::Path;

pub fn classify_fleet(config: &Config, fleet: &Path, mode: PowerOffMode, output: &Output) -> Result<()> {
    let spec = FleetSpec::load(fleet)?;
    let classification = classify(
        &spec.device_infos(),
        mode,
        config.power_settings().classifier,
        &StopMaintainOverrides::new(),
    )?;
    output.classification(&classification);
    Ok(())
}

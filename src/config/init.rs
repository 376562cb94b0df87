// ABOUTME: Config scaffolding for new installations.
// ABOUTME: Creates the fleetdown.yml template file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

use super::{CONFIG_FILENAME, Config};

/// Write a commented template to `dir`. Returns the path written.
pub fn init_config(dir: &Path, force: bool) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = generate_template_yaml(&Config::template());
    std::fs::write(&config_path, yaml)?;

    Ok(config_path)
}

fn generate_template_yaml(config: &Config) -> String {
    let command = std::iter::once(&config.os_shutdown.command.head)
        .chain(&config.os_shutdown.command.tail)
        .map(|arg| format!("\"{arg}\""))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"# Track devices are only powered off when a sample pipeline is installed.
pipeline: {}
timing:
  # Grace period after every instrument finished, before the software exits
  settle: {}
  # Delay before force power-off of instruments that do not shut down themselves
  delayed_power_off: {}
  post_power_off: {}
os_shutdown:
  # {{minutes}} and {{seconds}} are replaced with the delay
  command: [{}]
  delay: {}
"#,
        config.pipeline,
        seconds(config.timing.settle),
        seconds(config.timing.delayed_power_off),
        seconds(config.timing.post_power_off),
        command,
        seconds(config.os_shutdown.delay),
    )
}

fn seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

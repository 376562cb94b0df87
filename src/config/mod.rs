// ABOUTME: Configuration types and parsing for fleetdown.yml.
// ABOUTME: Handles YAML parsing, file discovery and conversion into power settings.

mod init;
mod shutdown;
mod timing;

pub use init::init_config;
pub use shutdown::OsShutdownConfig;
pub use timing::TimingConfig;

use crate::error::{Error, Result};
use crate::power::{ClassifierOptions, PowerSettings};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "fleetdown.yml";
pub const CONFIG_FILENAME_ALT: &str = "fleetdown.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".fleetdown/config.yml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "FLEETDOWN_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Track devices are only controlled when a sample pipeline is installed.
    #[serde(default = "default_pipeline")]
    pub pipeline: bool,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub os_shutdown: OsShutdownConfig,
}

fn default_pipeline() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self::template()
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // an empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::template());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Find and load the config for `dir`.
    ///
    /// `FLEETDOWN_CONFIG` takes precedence over the files in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::locate(dir)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::load(&path)
            }
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Like [`discover`](Self::discover), but falls back to defaults when no
    /// file exists.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::discover(dir) {
            Err(Error::ConfigNotFound(_)) => {
                tracing::debug!(dir = %dir.display(), "no config file, using defaults");
                Ok(Self::template())
            }
            other => other,
        }
    }

    fn locate(dir: &Path) -> Result<Option<PathBuf>> {
        if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            let path = PathBuf::from(explicit);
            if !path.exists() {
                return Err(Error::ConfigNotFound(path));
            }
            return Ok(Some(path));
        }

        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];
        Ok(candidates.into_iter().find(|p| p.exists()))
    }

    pub fn power_settings(&self) -> PowerSettings {
        PowerSettings {
            classifier: ClassifierOptions {
                pipeline_configured: self.pipeline,
            },
            settle: self.timing.settle,
            delayed_power_off: self.timing.delayed_power_off,
            post_power_off: self.timing.post_power_off,
            os_shutdown_delay: self.os_shutdown.delay,
        }
    }

    pub fn template() -> Self {
        Config {
            pipeline: default_pipeline(),
            timing: TimingConfig::default(),
            os_shutdown: OsShutdownConfig::default(),
        }
    }
}

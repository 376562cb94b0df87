// ABOUTME: Tunable timings and options of the power manager.
// ABOUTME: Built from the config file; defaults match the instrument firmware's expectations.

use std::time::Duration;

use super::classify::ClassifierOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSettings {
    pub classifier: ClassifierOptions,
    /// Grace period after the last device finished, before exiting.
    pub settle: Duration,
    /// Delay before force power-off of devices that finished maintenance
    /// without shutting themselves down.
    pub delayed_power_off: Duration,
    /// Pause after each delayed power-off.
    pub post_power_off: Duration,
    /// Delay handed to the OS shutdown command.
    pub os_shutdown_delay: Duration,
}

impl Default for PowerSettings {
    fn default() -> Self {
        Self {
            classifier: ClassifierOptions::default(),
            settle: Duration::from_secs(3),
            delayed_power_off: Duration::from_secs(3),
            post_power_off: Duration::from_secs(2),
            os_shutdown_delay: Duration::from_secs(60),
        }
    }
}

// ABOUTME: Exit sequence timings read from the config file.
// ABOUTME: Durations use humantime syntax such as "3s" or "500ms".

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimingConfig {
    /// Grace period once every device finished.
    #[serde(default = "default_settle", with = "humantime_serde")]
    pub settle: Duration,

    #[serde(default = "default_delayed_power_off", with = "humantime_serde")]
    pub delayed_power_off: Duration,

    #[serde(default = "default_post_power_off", with = "humantime_serde")]
    pub post_power_off: Duration,
}

fn default_settle() -> Duration {
    Duration::from_secs(3)
}

fn default_delayed_power_off() -> Duration {
    Duration::from_secs(3)
}

fn default_post_power_off() -> Duration {
    Duration::from_secs(2)
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            settle: default_settle(),
            delayed_power_off: default_delayed_power_off(),
            post_power_off: default_post_power_off(),
        }
    }
}

// ABOUTME: Host OS shutdown command configuration.
// ABOUTME: Arguments may contain {minutes} and {seconds} placeholders for the delay.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsShutdownConfig {
    #[serde(default = "default_command", deserialize_with = "deserialize_command")]
    pub command: NonEmpty<String>,

    #[serde(default = "default_delay", with = "humantime_serde")]
    pub delay: Duration,
}

fn default_command() -> NonEmpty<String> {
    NonEmpty {
        head: "shutdown".to_string(),
        tail: vec!["-h".to_string(), "+{minutes}".to_string()],
    }
}

fn default_delay() -> Duration {
    Duration::from_secs(60)
}

impl Default for OsShutdownConfig {
    fn default() -> Self {
        OsShutdownConfig {
            command: default_command(),
            delay: default_delay(),
        }
    }
}

impl OsShutdownConfig {
    /// Program and arguments with the delay placeholders filled in.
    ///
    /// Minutes round up so a sub-minute delay never becomes "now".
    pub fn render(&self, delay: Duration) -> (String, Vec<String>) {
        let seconds = delay.as_secs();
        let minutes = seconds.div_ceil(60);
        let fill = |arg: &String| {
            arg.replace("{minutes}", &minutes.to_string())
                .replace("{seconds}", &seconds.to_string())
        };

        let program = fill(&self.command.head);
        let args = self.command.tail.iter().map(fill).collect();
        (program, args)
    }
}

fn deserialize_command<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    let command = NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("shutdown command cannot be empty"))?;
    if command.head.trim().is_empty() {
        return Err(serde::de::Error::custom("shutdown program cannot be blank"));
    }
    Ok(command)
}

// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

use crate::power::{Classification, DeviceRecordSet, PowerNotification};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print an exit sequence notification.
    pub fn notification(&self, notification: &PowerNotification) {
        match self.mode {
            OutputMode::Normal => println!("{}", describe(notification)),
            OutputMode::Quiet => {}
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "notification",
                    message: &describe(notification),
                    timestamp: Utc::now(),
                    duration_secs: self.duration(),
                };
                print_json(&event);
            }
        }
    }

    /// Print the result of classifying a fleet.
    pub fn classification(&self, classification: &Classification) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                println!("halt:    {}", join(&classification.halt));
                println!("standby: {}", join(&classification.standby));
                println!("other:   {}", join(&classification.other));
            }
            OutputMode::Json => {
                let report = ClassificationReport {
                    halt: serials(&classification.halt),
                    standby: serials(&classification.standby),
                    other: serials(&classification.other),
                };
                print_json(&report);
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    timestamp: Utc::now(),
                    duration_secs: self.duration(),
                };
                print_json(&event);
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    timestamp: Utc::now(),
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn describe(notification: &PowerNotification) -> String {
    match notification {
        PowerNotification::Started { mode } => format!("Exit started ({mode})"),
        PowerNotification::Settling => "All instruments finished, settling".to_string(),
        PowerNotification::ReadyToExit { mode } => format!("Ready to exit ({mode})"),
        PowerNotification::ExitFailed { reason } => format!("Exit failed: {reason}"),
        PowerNotification::Cancelled => "Exit cancelled".to_string(),
    }
}

fn serials(set: &DeviceRecordSet) -> Vec<String> {
    set.serials().iter().map(ToString::to_string).collect()
}

fn join(set: &DeviceRecordSet) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        serials(set).join(", ")
    }
}

fn print_json<T: Serialize>(value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct ClassificationReport {
    halt: Vec<String>,
    standby: Vec<String>,
    other: Vec<String>,
}

// ABOUTME: Command module aggregator for the fleetdown CLI.
// ABOUTME: Re-exports classify and simulate command handlers.

mod classify;
mod simulate;

pub use classify::classify_fleet;
pub use simulate::{SimulateOptions, simulate};

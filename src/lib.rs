// ABOUTME: Library root for fleetdown - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod console;
pub mod error;
pub mod output;
pub mod ports;
pub mod power;
pub mod shutdown;
pub mod sim;
pub mod types;

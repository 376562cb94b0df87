// ABOUTME: Simulated instrument backend driven by a YAML fleet file.
// ABOUTME: Stands in for the RPC services in the CLI and in tests.

mod fleet;

pub use fleet::{
    ControlCall, DeviceSpec, FleetSpec, GroupSpec, MaintainBehavior, SimBehavior, SimFleet,
};

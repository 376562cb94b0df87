// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use fleetdown::power::PowerOffMode;
use fleetdown::types::PrivilegeLevel;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fleetdown")]
#[command(about = "Safe power-off orchestration for laboratory analyzer fleets")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new fleetdown.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show how a fleet would be grouped for power-off
    Classify(FleetArgs),

    /// Run a full exit sequence against a simulated fleet
    Simulate {
        #[command(flatten)]
        fleet: FleetArgs,

        /// Accept every confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Privilege level of the logged-in user (none when omitted)
        #[arg(long, value_enum)]
        user: Option<UserLevel>,

        /// Actually run the configured OS shutdown command
        #[arg(long)]
        allow_os_shutdown: bool,
    },
}

#[derive(Args)]
pub struct FleetArgs {
    /// Fleet description file
    #[arg(short, long)]
    pub fleet: PathBuf,

    /// Screen the exit is requested from
    #[arg(short, long, value_enum)]
    pub mode: ExitMode,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ExitMode {
    Login,
    Main,
}

impl From<ExitMode> for PowerOffMode {
    fn from(mode: ExitMode) -> Self {
        match mode {
            ExitMode::Login => PowerOffMode::LoginScreenExit,
            ExitMode::Main => PowerOffMode::MainScreenExit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum UserLevel {
    General,
    Admin,
    Engineer,
    Top,
}

impl From<UserLevel> for PrivilegeLevel {
    fn from(level: UserLevel) -> Self {
        match level {
            UserLevel::General => PrivilegeLevel::General,
            UserLevel::Admin => PrivilegeLevel::Admin,
            UserLevel::Engineer => PrivilegeLevel::Engineer,
            UserLevel::Top => PrivilegeLevel::Top,
        }
    }
}

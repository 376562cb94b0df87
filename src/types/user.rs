// ABOUTME: Logged-in user and privilege levels.
// ABOUTME: Privilege decides whether a main-screen exit also powers down the host OS.

use serde::{Deserialize, Serialize};

/// User privilege, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeLevel {
    General,
    Admin,
    Engineer,
    Top,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub name: String,
    pub privilege: PrivilegeLevel,
}

impl UserInfo {
    pub fn new(name: impl Into<String>, privilege: PrivilegeLevel) -> Self {
        Self {
            name: name.into(),
            privilege,
        }
    }

    /// Users below engineer level hand the whole workstation back on exit.
    pub fn requires_os_shutdown(&self) -> bool {
        self.privilege < PrivilegeLevel::Engineer
    }
}

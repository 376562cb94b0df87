// ABOUTME: Current-user port consulted when the main screen exits.
// ABOUTME: FixedUser serves a static answer for the CLI and tests.

use crate::types::UserInfo;

pub trait CurrentUser: Send + Sync {
    /// The logged-in user, if any.
    fn current(&self) -> Option<UserInfo>;
}

#[derive(Debug, Clone, Default)]
pub struct FixedUser(Option<UserInfo>);

impl FixedUser {
    pub fn new(user: UserInfo) -> Self {
        Self(Some(user))
    }

    pub fn nobody() -> Self {
        Self(None)
    }
}

impl CurrentUser for FixedUser {
    fn current(&self) -> Option<UserInfo> {
        self.0.clone()
    }
}

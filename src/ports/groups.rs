// ABOUTME: Maintenance group directory port.
// ABOUTME: Looks up group definitions by kind on the backend.

use async_trait::async_trait;

use crate::types::{MaintainGroup, MaintainGroupKind};

#[async_trait]
pub trait MaintainGroupDirectory: Send + Sync {
    /// Query every group definition of the given kind.
    async fn query(&self, kind: MaintainGroupKind) -> Result<Vec<MaintainGroup>, QueryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("maintenance group query rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

// ABOUTME: Resolves and caches the maintenance group to run before power-off.
// ABOUTME: Rejects shutdown groups that do not begin with an instrument reset.

use std::collections::HashMap;

use crate::ports::{MaintainGroupDirectory, QueryError};
use crate::types::{MaintainGroup, MaintainGroupKind, MaintainItemKind};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("maintenance group query failed: {0}")]
    Query(#[from] QueryError),

    #[error("no {0} maintenance group defined")]
    NotFound(MaintainGroupKind),

    #[error("{count} {kind} maintenance groups defined, expected exactly one")]
    Ambiguous {
        kind: MaintainGroupKind,
        count: usize,
    },

    #[error("{kind} maintenance group starts with {first:?} instead of an instrument reset")]
    MissingReset {
        kind: MaintainGroupKind,
        first: MaintainItemKind,
    },
}

/// Cache of resolved groups for the lifetime of one exit attempt.
#[derive(Debug, Default)]
pub struct MaintainGroupResolver {
    cache: HashMap<MaintainGroupKind, MaintainGroup>,
}

impl MaintainGroupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the group for `kind`, querying the directory on a cache miss.
    ///
    /// # Errors
    ///
    /// Fails when the query fails, when it does not return exactly one group,
    /// or when the group's first item is not `Reset`. Invalid groups are not
    /// cached. A group without items is accepted as a no-op maintenance.
    pub async fn resolve<D>(
        &mut self,
        directory: &D,
        kind: MaintainGroupKind,
    ) -> Result<MaintainGroup, ResolveError>
    where
        D: MaintainGroupDirectory + ?Sized,
    {
        if let Some(group) = self.cache.get(&kind) {
            return Ok(group.clone());
        }

        let mut groups = directory.query(kind).await?;
        let group = match groups.len() {
            0 => return Err(ResolveError::NotFound(kind)),
            1 => groups.remove(0),
            count => return Err(ResolveError::Ambiguous { kind, count }),
        };

        match group.first_item() {
            None => {
                tracing::warn!(%kind, group = %group.id, "maintenance group has no items");
            }
            Some(MaintainItemKind::Reset) => {}
            Some(first) => {
                tracing::error!(%kind, group = %group.id, ?first, "first maintenance item is not a reset");
                return Err(ResolveError::MissingReset { kind, first });
            }
        }

        tracing::debug!(%kind, group = %group.id, items = group.items.len(), "resolved maintenance group");
        self.cache.insert(kind, group.clone());
        Ok(group)
    }

    /// Cached group for `kind`, without querying.
    pub fn cached(&self, kind: MaintainGroupKind) -> Option<&MaintainGroup> {
        self.cache.get(&kind)
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MaintainGroupId;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Answers every query with the same canned response and counts calls.
    struct Canned {
        response: Result<Vec<MaintainGroup>, String>,
        calls: Mutex<usize>,
    }

    impl Canned {
        fn ok(groups: Vec<MaintainGroup>) -> Self {
            Self {
                response: Ok(groups),
                calls: Mutex::new(0),
            }
        }

        fn err(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock()
        }
    }

    #[async_trait]
    impl MaintainGroupDirectory for Canned {
        async fn query(&self, _kind: MaintainGroupKind) -> Result<Vec<MaintainGroup>, QueryError> {
            *self.calls.lock() += 1;
            self.response
                .clone()
                .map_err(QueryError::Transport)
        }
    }

    fn stop_group(items: &[MaintainItemKind]) -> MaintainGroup {
        MaintainGroup::new(
            MaintainGroupId::new(7),
            MaintainGroupKind::Stop,
            items.iter().copied(),
        )
    }

    #[tokio::test]
    async fn caches_successful_resolution() {
        let dir = Canned::ok(vec![stop_group(&[
            MaintainItemKind::Reset,
            MaintainItemKind::AutoShutdown,
        ])]);
        let mut resolver = MaintainGroupResolver::new();

        let first = resolver.resolve(&dir, MaintainGroupKind::Stop).await.unwrap();
        let second = resolver.resolve(&dir, MaintainGroupKind::Stop).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(dir.calls(), 1);
        assert!(resolver.cached(MaintainGroupKind::Stop).is_some());
    }

    #[tokio::test]
    async fn rejects_group_without_leading_reset() {
        let dir = Canned::ok(vec![stop_group(&[
            MaintainItemKind::ProbeClean,
            MaintainItemKind::Reset,
        ])]);
        let mut resolver = MaintainGroupResolver::new();

        let err = resolver
            .resolve(&dir, MaintainGroupKind::Stop)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::MissingReset {
                first: MaintainItemKind::ProbeClean,
                ..
            }
        ));
        assert!(resolver.cached(MaintainGroupKind::Stop).is_none());
    }

    #[tokio::test]
    async fn rejects_zero_or_many_groups() {
        let mut resolver = MaintainGroupResolver::new();

        let none = Canned::ok(vec![]);
        assert!(matches!(
            resolver.resolve(&none, MaintainGroupKind::Stop).await,
            Err(ResolveError::NotFound(MaintainGroupKind::Stop))
        ));

        let reset = [MaintainItemKind::Reset];
        let many = Canned::ok(vec![stop_group(&reset), stop_group(&reset)]);
        assert!(matches!(
            resolver.resolve(&many, MaintainGroupKind::Stop).await,
            Err(ResolveError::Ambiguous { count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn propagates_query_failure() {
        let dir = Canned::err("connection refused");
        let mut resolver = MaintainGroupResolver::new();

        let err = resolver
            .resolve(&dir, MaintainGroupKind::Week)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Query(_)));
    }

    #[tokio::test]
    async fn accepts_empty_group() {
        let dir = Canned::ok(vec![stop_group(&[])]);
        let mut resolver = MaintainGroupResolver::new();

        let group = resolver.resolve(&dir, MaintainGroupKind::Stop).await.unwrap();
        assert!(group.items.is_empty());
    }

    #[tokio::test]
    async fn clear_forces_requery() {
        let dir = Canned::ok(vec![stop_group(&[MaintainItemKind::Reset])]);
        let mut resolver = MaintainGroupResolver::new();

        resolver.resolve(&dir, MaintainGroupKind::Stop).await.unwrap();
        resolver.clear();
        resolver.resolve(&dir, MaintainGroupKind::Stop).await.unwrap();

        assert_eq!(dir.calls(), 2);
    }
}

//! Identity cache of materialized entities.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use modelsetup_client::ClientSessionId;

use crate::entity::ModelEntity;

type CacheKey = (ClientSessionId, String, String);

/// Last known state of each entity, per API session, type and identity.
///
/// Shared by every task of a run. The lock is only held for single map
/// operations and never across an `.await`.
#[derive(Debug, Default)]
pub struct IdentityCache {
    entries: Mutex<HashMap<CacheKey, ModelEntity>>,
}

impl IdentityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(session: ClientSessionId, entity: &ModelEntity) -> CacheKey {
        (session, entity.entity_type().to_string(), entity.identity())
    }

    /// Store `entity`, replacing any earlier state.
    pub fn insert(&self, session: ClientSessionId, entity: ModelEntity) {
        let key = Self::key(session, &entity);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, entity);
    }

    #[must_use]
    pub fn get(
        &self,
        session: ClientSessionId,
        entity_type: &str,
        identity: &str,
    ) -> Option<ModelEntity> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(session, entity_type.to_string(), identity.to_string()))
            .cloned()
    }

    /// The cached state for `entity`'s identity, caching `entity` if there is none.
    pub fn get_or_insert(&self, session: ClientSessionId, entity: ModelEntity) -> ModelEntity {
        let key = Self::key(session, &entity);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(entity)
            .clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything, e.g. between runs.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

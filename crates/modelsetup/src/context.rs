//! Ancestors visible to the entity being reconciled.

use crate::entity::ModelEntity;

/// Materialized ancestors keyed by entity type, in insertion order
/// (root first).
///
/// Each child task receives its own [`Context::branch`], so whatever one
/// sibling subtree adds is never seen by another.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    entries: Vec<(String, ModelEntity)>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `entity` under `entity_type`. An existing entry for the type
    /// is replaced where it stands.
    pub fn insert(&mut self, entity_type: impl Into<String>, entity: ModelEntity) {
        let entity_type = entity_type.into();
        match self.entries.iter_mut().find(|(t, _)| *t == entity_type) {
            Some(slot) => slot.1 = entity,
            None => self.entries.push((entity_type, entity)),
        }
    }

    #[must_use]
    pub fn get(&self, entity_type: &str) -> Option<&ModelEntity> {
        self.entries
            .iter()
            .find(|(t, _)| t == entity_type)
            .map(|(_, e)| e)
    }

    /// Entries root first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &ModelEntity)> {
        self.entries.iter().map(|(t, e)| (t.as_str(), e))
    }

    /// An independent copy for a child task.
    #[must_use]
    pub fn branch(&self) -> Self {
        self.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Lifecycle hooks around entity reconciliation.

use modelsetup_client::RestResponse;

use crate::entity::ModelEntity;
use crate::entity_config::EntityConfig;

/// Observer called at each step of a run. Every method defaults to a no-op.
///
/// Hooks run on whichever task is reconciling the entity, so implementations
/// must tolerate concurrent calls.
pub trait ModelSetupListener: Send + Sync {
    fn pre_entity_config(&self, _entity_type: &str) {}

    fn post_entity_config(&self, _entity_type: &str, _config: &EntityConfig) {}

    fn pre_lookup(&self, _entity: &ModelEntity) {}

    fn post_lookup(&self, _entity: &ModelEntity, _response: &RestResponse) {}

    fn pre_create(&self, _config: &EntityConfig, _entity: &ModelEntity) {}

    fn post_create(&self, _config: &EntityConfig, _entity: &ModelEntity, _created: &ModelEntity) {}

    fn pre_update(&self, _config: &EntityConfig, _entity: &ModelEntity) {}

    fn post_update(&self, _config: &EntityConfig, _entity: &ModelEntity, _updated: &ModelEntity) {}

    /// Rewrite an entity flagged with `_subst` before it is sent.
    fn subst(&self, entity: ModelEntity) -> ModelEntity {
        entity
    }
}

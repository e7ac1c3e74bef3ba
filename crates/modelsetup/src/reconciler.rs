//! Per-entity reconciliation: look up, then create, update or leave alone.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use modelsetup_client::{ApiError, EntityApi, RestResponse};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::Context;
use crate::engine::ModelSetup;
use crate::entity::ModelEntity;
use crate::entity_config::{EntityConfig, REF_PARENT};
use crate::error::{SetupError, SetupResult};
use crate::uri;

const HTTP_OK: u16 = 200;
const HTTP_NOT_FOUND: u16 = 404;

/// Boxed future of one reconcile, so child tasks can recurse into it.
pub type MaterializeFuture = Pin<Box<dyn Future<Output = SetupResult<Option<ModelEntity>>> + Send>>;

impl ModelSetup {
    /// Bring one entity (and its children) in line with the model.
    ///
    /// Resolves to the authoritative entity, or `None` when nothing was
    /// materialized (verify mode found it missing, or a conflicting create
    /// could not be checked and was skipped).
    pub fn materialize(
        &self,
        api: Arc<dyn EntityApi>,
        config: Arc<EntityConfig>,
        entity: ModelEntity,
        context: Context,
    ) -> MaterializeFuture {
        let engine = self.clone();
        Box::pin(async move { engine.reconcile(api, config, entity, context).await })
    }

    async fn reconcile(
        &self,
        api: Arc<dyn EntityApi>,
        config: Arc<EntityConfig>,
        request: ModelEntity,
        mut context: Context,
    ) -> SetupResult<Option<ModelEntity>> {
        let entity_type = request.entity_type().to_string();

        let lookup_uri = match config.lookup_uri() {
            Some(template) => uri::resolve(&context, &request, template)?,
            None => None,
        };

        let materialized = match lookup_uri {
            None if self.is_verify() => {
                if let Some(sink) = &self.verify_log {
                    sink.log_creation(&config, &request);
                }
                Some(request.clone())
            }
            None => self.create(api.as_ref(), &config, &context, request.clone()).await?,
            Some(lookup_uri) => {
                self.lookup_and_reconcile(api.as_ref(), &config, &context, &request, &lookup_uri)
                    .await?
            }
        };

        let Some(mut entity) = materialized else {
            return Ok(None);
        };

        self.cache.insert(api.session_id(), entity.clone());

        // responses never echo child data back
        entity.set_children(request.children().clone());
        context.insert(entity_type, entity.clone());

        if entity.has_children() {
            self.materialize_children(&api, &config, &entity, &context)
                .await?;
        }
        Ok(Some(entity))
    }

    async fn lookup_and_reconcile(
        &self,
        api: &dyn EntityApi,
        config: &EntityConfig,
        context: &Context,
        request: &ModelEntity,
        lookup_uri: &str,
    ) -> SetupResult<Option<ModelEntity>> {
        let entity_type = request.entity_type();

        if let Some(listener) = &self.listener {
            listener.pre_lookup(request);
        }
        let response = api
            .get(lookup_uri)
            .await
            .map_err(|source| self.remote_error(entity_type, lookup_uri, source))?;
        if let Some(listener) = &self.listener {
            listener.post_lookup(request, &response);
        }

        match response.status {
            HTTP_OK => {
                let remote = ModelEntity::from_remote(
                    self.decode(entity_type, lookup_uri, &response)?,
                    request.class_name(),
                );

                if let Some(sink) = &self.verify_log {
                    let remote = self.substitute(remote, request.perform_substitution());
                    sink.log_difference(config, &remote, request);
                    // descendants resolve against the remote identity
                    Ok(Some(request.merged_onto(&remote)))
                } else if request.allow_update() {
                    let existing = self.cache.get_or_insert(api.session_id(), remote);
                    let to_update = request.merged_onto(&existing);
                    info!(
                        run = %self.run_label(),
                        entity_type = %entity_type,
                        entity = %to_update.id(),
                        "Already exists, updating"
                    );
                    self.update(api, config, context, to_update).await.map(Some)
                } else {
                    info!(
                        run = %self.run_label(),
                        entity_type = %entity_type,
                        uri = %lookup_uri,
                        "Already exists"
                    );
                    Ok(Some(remote))
                }
            }
            HTTP_NOT_FOUND => match &self.verify_log {
                Some(sink) => {
                    sink.log_creation(config, request);
                    Ok(None)
                }
                None => self.create(api, config, context, request.clone()).await,
            },
            status => Err(SetupError::UnexpectedStatus {
                entity_type: entity_type.to_string(),
                run_label: self.run_label().to_string(),
                uri: lookup_uri.to_string(),
                status,
            }),
        }
    }

    async fn create(
        &self,
        api: &dyn EntityApi,
        config: &EntityConfig,
        context: &Context,
        mut entity: ModelEntity,
    ) -> SetupResult<Option<ModelEntity>> {
        if self.is_verify() {
            info!(entity = %entity.id(), "Verify mode, not creating");
            return Ok(Some(entity));
        }

        let uri = uri::resolve(context, &entity, &config.create_uri)?.ok_or_else(|| {
            SetupError::TemplateResolution {
                template: config.create_uri.clone(),
                uri: config.create_uri.clone(),
            }
        })?;

        set_parent_fields(context, config, &mut entity)?;
        let flagged = entity.perform_substitution();
        let entity = self.substitute(entity, flagged);

        if let Some(listener) = &self.listener {
            listener.pre_create(config, &entity);
        }
        if !config.create_method.is_write() {
            return Err(SetupError::InvalidMethod {
                entity_type: entity.entity_type().to_string(),
                operation: "create",
                method: config.create_method,
            });
        }

        info!(
            run = %self.run_label(),
            entity_type = %entity.entity_type(),
            entity = %entity.id(),
            method = %config.create_method,
            uri = %uri,
            "Creating"
        );
        let created = match api.send(config.create_method, &uri, &entity.to_json()).await {
            Ok(value) => entity.with_response(value),
            Err(err) if err.is_validation() => {
                match self.recover_conflict(api, config, context, &entity, &uri, err).await? {
                    Some(existing) => existing,
                    None => return Ok(None),
                }
            }
            Err(source) => return Err(self.remote_error(entity.entity_type(), &uri, source)),
        };

        if let Some(listener) = &self.listener {
            listener.post_create(config, &entity, &created);
        }
        Ok(Some(created))
    }

    /// A create was rejected as invalid: maybe another writer created the
    /// entity first. Look it up once.
    async fn recover_conflict(
        &self,
        api: &dyn EntityApi,
        config: &EntityConfig,
        context: &Context,
        entity: &ModelEntity,
        create_uri: &str,
        original: ApiError,
    ) -> SetupResult<Option<ModelEntity>> {
        let lookup_uri = match config.lookup_uri() {
            Some(template) => uri::resolve(context, entity, template)?,
            None => None,
        };

        let Some(lookup_uri) = lookup_uri else {
            if entity.has_children() {
                return Err(SetupError::UnrecoverableConflict {
                    entity_type: entity.entity_type().to_string(),
                    run_label: self.run_label().to_string(),
                    source: original,
                });
            }
            warn!(
                run = %self.run_label(),
                entity_type = %entity.entity_type(),
                entity = %entity.id(),
                error = %original,
                "Error creating and cannot check for existence, no children, skipping"
            );
            return Ok(None);
        };

        match api.fetch(&lookup_uri).await {
            Ok(value) => {
                info!(
                    run = %self.run_label(),
                    entity_type = %entity.entity_type(),
                    uri = %lookup_uri,
                    "Create conflicted, entity already exists"
                );
                Ok(Some(entity.with_response(value)))
            }
            Err(lookup_err) => {
                error!(
                    run = %self.run_label(),
                    entity_type = %entity.entity_type(),
                    uri = %lookup_uri,
                    error = %lookup_err,
                    "Recovery lookup after conflicting create failed"
                );
                Err(SetupError::RemoteConflict {
                    entity_type: entity.entity_type().to_string(),
                    run_label: self.run_label().to_string(),
                    uri: create_uri.to_string(),
                    source: original,
                })
            }
        }
    }

    async fn update(
        &self,
        api: &dyn EntityApi,
        config: &EntityConfig,
        context: &Context,
        mut entity: ModelEntity,
    ) -> SetupResult<ModelEntity> {
        if self.is_verify() {
            info!(entity = %entity.id(), "Verify mode, not updating");
            return Ok(entity);
        }

        let template = config.update_uri.clone().unwrap_or_default();
        let uri = match config.lookup_uri() {
            Some(template) => uri::resolve(context, &entity, template)?,
            None => None,
        }
        .ok_or_else(|| SetupError::TemplateResolution {
            template: template.clone(),
            uri: template,
        })?;

        set_parent_fields(context, config, &mut entity)?;
        let flagged = entity.perform_substitution();
        let entity = self.substitute(entity, flagged);

        if let Some(listener) = &self.listener {
            listener.pre_update(config, &entity);
        }
        if !config.update_method.is_write() {
            return Err(SetupError::InvalidMethod {
                entity_type: entity.entity_type().to_string(),
                operation: "update",
                method: config.update_method,
            });
        }

        info!(
            run = %self.run_label(),
            entity_type = %entity.entity_type(),
            entity = %entity.id(),
            method = %config.update_method,
            uri = %uri,
            "Updating"
        );
        let updated = api
            .send(config.update_method, &uri, &entity.to_json())
            .await
            .map(|value| entity.with_response(value))
            .map_err(|source| self.remote_error(entity.entity_type(), &uri, source))?;

        if let Some(listener) = &self.listener {
            listener.post_update(config, &entity, &updated);
        }
        Ok(updated)
    }

    fn substitute(&self, entity: ModelEntity, flagged: bool) -> ModelEntity {
        match &self.listener {
            Some(listener) if flagged => listener.subst(entity),
            _ => entity,
        }
    }

    fn decode(&self, entity_type: &str, uri: &str, response: &RestResponse) -> SetupResult<Value> {
        response
            .json_value()
            .map_err(|e| SetupError::parse(format!("{entity_type} at {uri}"), e))
    }

    fn remote_error(&self, entity_type: &str, uri: &str, source: ApiError) -> SetupError {
        SetupError::Remote {
            entity_type: entity_type.to_string(),
            run_label: self.run_label().to_string(),
            uri: uri.to_string(),
            source,
        }
    }
}

/// Point the entity's parent field at the matching ancestor in `context`.
///
/// The nearest ancestor whose type matches (ignoring case) wins. A reference
/// to [`REF_PARENT`] means the ancestor type is the field name itself.
fn set_parent_fields(
    context: &Context,
    config: &EntityConfig,
    entity: &mut ModelEntity,
) -> SetupResult<()> {
    let Some(parent_field) = &config.parent_field else {
        return Ok(());
    };
    let Some(field_name) = parent_field.name.as_deref() else {
        debug!(entity_type = %entity.entity_type(), "No parent field name, not setting");
        return Ok(());
    };

    let parent_type = if parent_field.reference.entity == REF_PARENT {
        field_name
    } else {
        parent_field.reference.entity.as_str()
    };

    let parent = context
        .iter()
        .rev()
        .find(|(entity_type, _)| entity_type.eq_ignore_ascii_case(parent_type))
        .map(|(_, parent)| parent)
        .ok_or_else(|| SetupError::MissingParentReference {
            parent_type: parent_type.to_string(),
            field: field_name.to_string(),
            entity_type: entity.entity_type().to_string(),
            entity: entity.id(),
        })?;

    let value = parent
        .field(&parent_field.reference.field)
        .filter(|value| !value.is_null())
        .cloned()
        .ok_or_else(|| SetupError::MissingParentReference {
            parent_type: format!("{parent_type}.{}", parent_field.reference.field),
            field: field_name.to_string(),
            entity_type: entity.entity_type().to_string(),
            entity: entity.id(),
        })?;
    entity.set_field(field_name, value);
    Ok(())
}

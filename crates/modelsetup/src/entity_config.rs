//! Entity configs: server-supplied descriptions of how to create, update and
//! look up one entity type.
//!
//! A config is fetched once per root type per run and then shared read-only
//! (behind an `Arc`) by every reconcile task working on that type. Child
//! configs are nested inside their parent's config.

use std::collections::BTreeMap;

use modelsetup_client::{EntityApi, HttpMethod};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SetupError, SetupResult};

/// Update URI value meaning the type cannot be looked up or updated.
pub const URI_NOT_SUPPORTED: &str = ":notSupported";

/// Parent reference meaning "the ancestor whose type is the field name".
pub const REF_PARENT: &str = "parent";

fn default_create_method() -> HttpMethod {
    HttpMethod::Put
}

fn default_update_method() -> HttpMethod {
    HttpMethod::Post
}

fn default_reference_entity() -> String {
    REF_PARENT.to_string()
}

fn default_reference_field() -> String {
    "uuid".to_string()
}

/// Descriptor of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    /// Human-readable type name.
    #[serde(default)]
    pub name: String,

    /// Fully-qualified type identifier, e.g. `org.example.model.Account`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// URI template entities are created at.
    #[serde(default)]
    pub create_uri: String,

    #[serde(default = "default_create_method")]
    pub create_method: HttpMethod,

    /// URI template entities are looked up and updated at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_uri: Option<String>,

    #[serde(default = "default_update_method")]
    pub update_method: HttpMethod,

    /// Field that references the owning parent entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_field: Option<ParentFieldConfig>,

    /// Child type name to child config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeMap<String, EntityConfig>>,
}

/// Which field of an entity points at its parent, and where the value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentFieldConfig {
    /// Field on this entity receiving the parent's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub reference: FieldReference,
}

/// Source of a parent-field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    /// Type of the ancestor, or [`REF_PARENT`].
    #[serde(default = "default_reference_entity")]
    pub entity: String,

    /// Field read from the ancestor.
    #[serde(default = "default_reference_field")]
    pub field: String,
}

impl Default for FieldReference {
    fn default() -> Self {
        Self {
            entity: default_reference_entity(),
            field: default_reference_field(),
        }
    }
}

impl EntityConfig {
    /// URI template used for existence checks and updates, if supported.
    #[must_use]
    pub fn lookup_uri(&self) -> Option<&str> {
        self.update_uri
            .as_deref()
            .filter(|uri| !uri.is_empty() && *uri != URI_NOT_SUPPORTED)
    }

    #[must_use]
    pub fn has_parent_field(&self) -> bool {
        self.parent_field.is_some()
    }

    #[must_use]
    pub fn has_children(&self) -> bool {
        self.children.as_ref().is_some_and(|c| !c.is_empty())
    }

    /// Config of the named child type.
    #[must_use]
    pub fn child(&self, child_type: &str) -> Option<&EntityConfig> {
        self.children.as_ref().and_then(|c| c.get(child_type))
    }

    /// Class name of a root entity: the declared one, or the config name.
    #[must_use]
    pub fn root_class_name(&self, entity_type: &str) -> String {
        self.class_name.clone().unwrap_or_else(|| {
            if self.name.is_empty() {
                entity_type.to_string()
            } else {
                self.name.clone()
            }
        })
    }
}

/// Last dotted segment of a class name.
#[must_use]
pub fn simple_name(class_name: &str) -> &str {
    class_name.rsplit('.').next().unwrap_or(class_name)
}

/// Class name of an undeclared child: the parent's package plus the child type.
#[must_use]
pub fn child_class_name(parent_class: &str, child_type: &str) -> String {
    match parent_class.rfind('.') {
        Some(idx) => format!("{}.{}", &parent_class[..idx], child_type),
        None => child_type.to_string(),
    }
}

/// `GET {endpoint}/{entity_type}` and decode the config.
pub async fn fetch_entity_config(
    api: &dyn EntityApi,
    endpoint: &str,
    entity_type: &str,
    run_label: &str,
) -> SetupResult<EntityConfig> {
    let path = format!("{}/{}", endpoint.trim_end_matches('/'), entity_type);
    debug!(entity_type = %entity_type, uri = %path, "Fetching entity config");

    let response = api
        .get(&path)
        .await
        .map_err(|source| SetupError::Remote {
            entity_type: entity_type.to_string(),
            run_label: run_label.to_string(),
            uri: path.clone(),
            source,
        })?;

    if !response.is_success() {
        return Err(SetupError::ConfigNotFound {
            entity_type: entity_type.to_string(),
            status: response.status,
        });
    }

    response
        .json::<EntityConfig>()
        .map_err(|e| SetupError::InvalidEntityConfig {
            entity_type: entity_type.to_string(),
            message: e.to_string(),
        })
}

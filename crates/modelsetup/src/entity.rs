//! The entity wrapper the engine reconciles.
//!
//! A [`ModelEntity`] carries the entity's JSON fields together with the
//! per-instance flags read from the model file and the raw child data, which
//! stays untyped until the parent's config says what the children are.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::error;

use crate::entity_config::simple_name;
use crate::error::{SetupError, SetupResult};
use crate::manifest::strip_json_comments;

/// Model flag: update the entity if it already exists.
pub const ALLOW_UPDATE_PROPERTY: &str = "_update";

/// Model flag: run the listener's substitution hook before sending.
pub const PERFORM_SUBST_PROPERTY: &str = "_subst";

/// Model key holding child data, keyed by child type.
pub const CHILDREN_PROPERTY: &str = "children";

/// One entity instance plus its model metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelEntity {
    entity_type: String,
    class_name: String,
    fields: Map<String, Value>,
    children: BTreeMap<String, Vec<Value>>,
    allow_update: bool,
    perform_substitution: bool,
}

impl ModelEntity {
    /// Build an entity from one model node, consuming its flags and child data.
    pub fn from_node(mut node: Map<String, Value>, class_name: &str) -> Self {
        let allow_update = take_flag(&mut node, ALLOW_UPDATE_PROPERTY);
        let perform_substitution = take_flag(&mut node, PERFORM_SUBST_PROPERTY);

        let mut children = BTreeMap::new();
        if let Some(Value::Object(by_type)) = node.get(CHILDREN_PROPERTY) {
            if by_type.values().all(Value::is_array) {
                if let Some(Value::Object(by_type)) = node.remove(CHILDREN_PROPERTY) {
                    for (child_type, data) in by_type {
                        if let Value::Array(items) = data {
                            children.insert(child_type, items);
                        }
                    }
                }
            }
        }

        Self {
            entity_type: simple_name(class_name).to_string(),
            class_name: class_name.to_string(),
            fields: node,
            children,
            allow_update,
            perform_substitution,
        }
    }

    /// Wrap an entity returned by the API. Non-object values yield no fields.
    #[must_use]
    pub fn from_remote(value: Value, class_name: &str) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            entity_type: simple_name(class_name).to_string(),
            class_name: class_name.to_string(),
            fields,
            children: BTreeMap::new(),
            allow_update: false,
            perform_substitution: false,
        }
    }

    /// The entity the API answered with, or this one if the answer had no body.
    #[must_use]
    pub fn with_response(&self, value: Value) -> Self {
        match value {
            Value::Object(_) => Self::from_remote(value, &self.class_name),
            _ => Self {
                children: BTreeMap::new(),
                allow_update: false,
                perform_substitution: false,
                ..self.clone()
            },
        }
    }

    /// `remote` with every non-null field of `self` written over it.
    ///
    /// Flags are kept from `self`, so the update carries the remote identity
    /// and the desired state together.
    #[must_use]
    pub fn merged_onto(&self, remote: &ModelEntity) -> Self {
        let mut fields = remote.fields.clone();
        for (name, value) in &self.fields {
            if !value.is_null() {
                fields.insert(name.clone(), value.clone());
            }
        }
        Self {
            entity_type: self.entity_type.clone(),
            class_name: self.class_name.clone(),
            fields,
            children: self.children.clone(),
            allow_update: self.allow_update,
            perform_substitution: self.perform_substitution,
        }
    }

    /// Simple type name, e.g. `Account`.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Fully-qualified type identifier.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    #[must_use]
    pub fn children(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.children
    }

    /// Whether any child type carries at least one item.
    #[must_use]
    pub fn has_children(&self) -> bool {
        self.children.values().any(|items| !items.is_empty())
    }

    pub fn set_children(&mut self, children: BTreeMap<String, Vec<Value>>) {
        self.children = children;
    }

    #[must_use]
    pub fn allow_update(&self) -> bool {
        self.allow_update
    }

    #[must_use]
    pub fn perform_substitution(&self) -> bool {
        self.perform_substitution
    }

    /// Server-assigned uuid, if known.
    #[must_use]
    pub fn uuid(&self) -> Option<&str> {
        self.fields.get("uuid").and_then(Value::as_str)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Cache identity: the uuid, falling back to the name.
    #[must_use]
    pub fn identity(&self) -> String {
        self.uuid()
            .or_else(|| self.name())
            .unwrap_or_default()
            .to_string()
    }

    /// Display identity for log lines: name, else uuid, else the JSON text.
    #[must_use]
    pub fn id(&self) -> String {
        match self.name().or_else(|| self.uuid()) {
            Some(id) => id.to_string(),
            None => Value::Object(self.fields.clone()).to_string(),
        }
    }

    /// The body sent to the API. Flags and child data are never included.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

fn take_flag(node: &mut Map<String, Value>, property: &str) -> bool {
    node.remove(property)
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Parse a model document (a JSON array, comments allowed) into entities.
///
/// Items that are not objects are logged and skipped.
pub fn parse_entities(json: &str, class_name: &str) -> SetupResult<Vec<ModelEntity>> {
    let nodes: Vec<Value> = serde_json::from_str(&strip_json_comments(json))
        .map_err(|e| SetupError::parse(format!("{class_name} model"), e))?;
    Ok(entities_from_nodes(nodes, class_name))
}

/// Wrap raw child nodes, skipping anything that is not an object.
#[must_use]
pub fn entities_from_nodes(nodes: Vec<Value>, class_name: &str) -> Vec<ModelEntity> {
    nodes
        .into_iter()
        .filter_map(|node| match node {
            Value::Object(map) => Some(ModelEntity::from_node(map, class_name)),
            other => {
                error!(class_name = %class_name, node = %other, "Not a JSON object, skipping");
                None
            }
        })
        .collect()
}

/// Remove the model flags from raw JSON nodes.
pub fn scrub_special_properties<'a>(nodes: impl IntoIterator<Item = &'a mut Value>) {
    for node in nodes {
        if let Value::Object(map) = node {
            map.remove(ALLOW_UPDATE_PROPERTY);
            map.remove(PERFORM_SUBST_PROPERTY);
        }
    }
}

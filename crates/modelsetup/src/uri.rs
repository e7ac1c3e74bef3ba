//! URI template resolution.
//!
//! Templates reference ancestors as `{Type.field}` and the entity itself as
//! `{field}`. `{uuid}` may fall back to the entity's name; if it cannot be
//! filled at all, no existence check is possible and `None` is returned.

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::Context;
use crate::entity::ModelEntity;
use crate::error::{SetupError, SetupResult};

const UUID_PLACEHOLDER: &str = "{uuid}";

/// Fill `template` from `context` and `entity`.
///
/// Returns `Ok(None)` when `{uuid}` cannot be resolved, and
/// [`SetupError::TemplateResolution`] when any other placeholder remains.
pub fn resolve(
    context: &Context,
    entity: &ModelEntity,
    template: &str,
) -> SetupResult<Option<String>> {
    let mut uri = template.to_string();

    for (entity_type, ancestor) in context.iter() {
        uri = replace_ancestor_fields(uri, strip_synthetic(entity_type), ancestor.fields());
    }

    uri = replace_fields(uri, entity.fields());

    if uri.contains(UUID_PLACEHOLDER) {
        if let Some(name) = entity.field("name").and_then(render) {
            uri = uri.replace(UUID_PLACEHOLDER, &name);
        }
    }
    if uri.contains(UUID_PLACEHOLDER) {
        debug!(uri = %uri, "Could not replace {{uuid}} in URI, no lookup possible");
        return Ok(None);
    }
    if uri.contains('{') {
        return Err(SetupError::TemplateResolution {
            template: template.to_string(),
            uri,
        });
    }

    Ok(Some(if uri.starts_with('/') {
        uri
    } else {
        format!("/{uri}")
    }))
}

/// Fill `{Type.field}` placeholders whose type matches `entity_type`,
/// ignoring case, so a manifest type `account` still fills `{Account.uuid}`.
fn replace_ancestor_fields(uri: String, entity_type: &str, fields: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(uri.len());
    let mut rest = uri.as_str();

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let Some(end) = tail.find('}') else {
            out.push_str(tail);
            return out;
        };

        let rendered = tail[1..end]
            .split_once('.')
            .filter(|(ty, _)| ty.eq_ignore_ascii_case(entity_type))
            .and_then(|(_, field)| fields.get(field))
            .and_then(render);
        match rendered {
            Some(value) => out.push_str(&value),
            None => out.push_str(&tail[..=end]),
        }
        rest = &tail[end + 1..];
    }

    out.push_str(rest);
    out
}

fn replace_fields(mut uri: String, fields: &Map<String, Value>) -> String {
    for (name, value) in fields {
        let placeholder = format!("{{{}}}", strip_synthetic(name));
        if uri.contains(&placeholder) {
            if let Some(rendered) = render(value) {
                uri = uri.replace(&placeholder, &rendered);
            }
        }
    }
    uri
}

/// Drop a generated `$$...` suffix from a name.
fn strip_synthetic(name: &str) -> &str {
    name.find("$$").map_or(name, |idx| &name[..idx])
}

/// URL-encoded text of a field value; strings are unquoted, nulls render nothing.
fn render(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(urlencoding::encode(&text).into_owned())
}

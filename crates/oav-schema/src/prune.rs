//! `removeAdditional` handling: strip undeclared properties from the request
//! instance before the engine sees it.

use serde_json::Value;

use oav_core::RemoveAdditional;

use crate::document::MAX_REF_DEPTH;
use crate::node::{primary_type, SchemaResolver};

/// Remove undeclared properties from `instance` according to `mode`.
/// `schema` is the combined request schema; its `components` resolve
/// references.
pub fn prune(instance: &mut Value, schema: &Value, mode: RemoveAdditional) {
    if mode == RemoveAdditional::Off {
        return;
    }
    let resolver = SchemaResolver::new(schema);
    prune_at(instance, schema, resolver, mode, 0);
}

fn prune_at<'a>(
    value: &mut Value,
    schema: &'a Value,
    resolver: SchemaResolver<'a>,
    mode: RemoveAdditional,
    depth: usize,
) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    let Some(schema) = resolver.resolve(schema) else {
        return;
    };
    match value {
        Value::Object(map) => {
            let declared = resolver.properties(schema);
            let has_properties = !declared.is_empty() || schema.get("properties").is_some();
            if has_properties && schema.get("patternProperties").is_none() {
                let additional = schema.get("additionalProperties");
                map.retain(|name, child| {
                    if declared.iter().any(|(n, _)| *n == name.as_str()) {
                        return true;
                    }
                    !removable(mode, additional, child, resolver)
                });
            }
            for (name, sub) in declared {
                if let Some(child) = map.get_mut(name) {
                    prune_at(child, sub, resolver, mode, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items.iter_mut() {
                    prune_at(item, item_schema, resolver, mode, depth + 1);
                }
            }
        }
        _ => {}
    }
}

fn removable(
    mode: RemoveAdditional,
    additional: Option<&Value>,
    value: &Value,
    resolver: SchemaResolver<'_>,
) -> bool {
    match mode {
        RemoveAdditional::Off => false,
        RemoveAdditional::All => true,
        RemoveAdditional::Declared => additional == Some(&Value::Bool(false)),
        RemoveAdditional::Failing => match additional {
            Some(Value::Bool(allowed)) => !allowed,
            Some(sub) => resolver
                .resolve(sub)
                .and_then(primary_type)
                .is_some_and(|expected| !shallow_type_matches(value, expected)),
            None => false,
        },
    }
}

fn shallow_type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

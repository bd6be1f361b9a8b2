//! OpenAPI 3.0 schema dialect to JSON Schema Draft 7.
//!
//! Two rewrites are needed before the engine sees a schema:
//!
//! - `nullable: true` becomes a `null` member of `type` (and of `enum`);
//! - boolean `exclusiveMinimum`/`exclusiveMaximum` become their numeric form.
//!
//! Everything else passes through untouched; unknown OpenAPI keywords such
//! as `example` or `discriminator` are ignored by the engine.

use serde_json::{Map, Value};

/// Keywords holding a single subschema.
const SINGLE_SUBSCHEMA: [&str; 3] = ["not", "additionalProperties", "items"];

/// Keywords holding an array of subschemas.
const SUBSCHEMA_LISTS: [&str; 3] = ["allOf", "anyOf", "oneOf"];

/// Keywords holding a map of subschemas.
const SUBSCHEMA_MAPS: [&str; 2] = ["properties", "patternProperties"];

/// Return a normalized copy of `schema`.
pub fn normalize_schema(schema: &Value) -> Value {
    let mut out = schema.clone();
    normalize_in_place(&mut out);
    out
}

/// Normalize `schema` in place, recursing through every subschema.
pub fn normalize_in_place(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };

    rewrite_nullable(map);
    rewrite_exclusive(map, "exclusiveMinimum", "minimum");
    rewrite_exclusive(map, "exclusiveMaximum", "maximum");

    for key in SINGLE_SUBSCHEMA {
        match map.get_mut(key) {
            Some(Value::Array(items)) => items.iter_mut().for_each(normalize_in_place),
            Some(sub) => normalize_in_place(sub),
            None => {}
        }
    }
    for key in SUBSCHEMA_LISTS {
        if let Some(Value::Array(members)) = map.get_mut(key) {
            members.iter_mut().for_each(normalize_in_place);
        }
    }
    for key in SUBSCHEMA_MAPS {
        if let Some(Value::Object(children)) = map.get_mut(key) {
            children.values_mut().for_each(normalize_in_place);
        }
    }
}

fn rewrite_nullable(map: &mut Map<String, Value>) {
    let Some(nullable) = map.remove("nullable") else {
        return;
    };
    if nullable != Value::Bool(true) {
        return;
    }

    let widened = match map.get("type") {
        Some(Value::String(t)) if t != "null" => {
            Some(Value::Array(vec![Value::String(t.clone()), Value::from("null")]))
        }
        Some(Value::Array(types)) if !types.iter().any(|t| t == "null") => {
            let mut types = types.clone();
            types.push(Value::from("null"));
            Some(Value::Array(types))
        }
        _ => None,
    };
    if let Some(types) = widened {
        map.insert("type".into(), types);
    }

    if let Some(Value::Array(options)) = map.get_mut("enum") {
        if !options.iter().any(Value::is_null) {
            options.push(Value::Null);
        }
    }
}

fn rewrite_exclusive(map: &mut Map<String, Value>, exclusive: &str, inclusive: &str) {
    match map.get(exclusive).and_then(Value::as_bool) {
        Some(true) => match map.remove(inclusive) {
            Some(limit) => {
                map.insert(exclusive.into(), limit);
            }
            None => {
                map.remove(exclusive);
            }
        },
        Some(false) => {
            map.remove(exclusive);
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nullable_adds_null_type() {
        let out = normalize_schema(&json!({ "type": "string", "nullable": true }));
        assert_eq!(out, json!({ "type": ["string", "null"] }));
    }

    #[test]
    fn nullable_extends_enum() {
        let out = normalize_schema(&json!({ "type": "string", "enum": ["a"], "nullable": true }));
        assert_eq!(out["enum"], json!(["a", null]));
    }

    #[test]
    fn nullable_false_is_dropped() {
        let out = normalize_schema(&json!({ "type": "integer", "nullable": false }));
        assert_eq!(out, json!({ "type": "integer" }));
    }

    #[test]
    fn boolean_exclusive_bounds_become_numeric() {
        let out = normalize_schema(&json!({
            "type": "number",
            "minimum": 0,
            "exclusiveMinimum": true,
            "maximum": 10,
            "exclusiveMaximum": false
        }));
        assert_eq!(out, json!({ "type": "number", "exclusiveMinimum": 0, "maximum": 10 }));
    }

    #[test]
    fn recurses_into_subschemas() {
        let out = normalize_schema(&json!({
            "type": "object",
            "properties": {
                "tags": { "type": "array", "items": { "type": "string", "nullable": true } }
            },
            "allOf": [{ "type": "object", "nullable": true }],
            "additionalProperties": { "type": "integer", "nullable": true }
        }));
        assert_eq!(out["properties"]["tags"]["items"]["type"], json!(["string", "null"]));
        assert_eq!(out["allOf"][0]["type"], json!(["object", "null"]));
        assert_eq!(out["additionalProperties"]["type"], json!(["integer", "null"]));
    }

    #[test]
    fn refs_pass_through() {
        let schema = json!({ "$ref": "#/components/schemas/Pet" });
        assert_eq!(normalize_schema(&schema), schema);
    }
}

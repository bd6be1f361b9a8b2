//! # Coercion, Defaults, Deserializers
//!
//! Parameter values arrive as strings. After style handling they are coerced
//! toward the declared types the way a `coerceTypes: "array"` validator
//! does it:
//!
//! - strings become integers, numbers, booleans, or `null` when the text
//!   parses as such;
//! - booleans and `null` become numbers (`1`/`0`), and scalars become strings;
//! - a scalar is wrapped for an array schema, and a one-element array is
//!   unwrapped for a scalar schema;
//! - objects and arrays are walked through `properties` and `items`.
//!
//! Only `$ref` and `allOf` are looked through. `anyOf`/`oneOf` targets are
//! left alone, and bodies are never coerced. Defaults are injected into both
//! parameters and bodies. Deserializers run last, on validated values.

use serde_json::{Number, Value};

use oav_core::{NormalizedRequest, ValidatorOptions};

use crate::document::MAX_REF_DEPTH;
use crate::node::{SchemaNode, SchemaResolver};
use crate::parameters::ParameterDescriptor;

/// Coerce every present parameter toward its schema.
pub fn coerce_parameters(
    request: &mut NormalizedRequest,
    descriptors: &[ParameterDescriptor],
    resolver: SchemaResolver<'_>,
) {
    for descriptor in descriptors {
        let field = request.field_mut(descriptor.location);
        if let Some(value) = field.get_mut(&descriptor.name) {
            coerce_value(value, &descriptor.schema, resolver, 0);
        }
    }
}

/// Insert schema defaults for absent parameters and absent body properties.
pub fn apply_defaults(
    request: &mut NormalizedRequest,
    descriptors: &[ParameterDescriptor],
    body_schema: &Value,
    resolver: SchemaResolver<'_>,
) {
    for descriptor in descriptors {
        let field = request.field_mut(descriptor.location);
        match field.get_mut(&descriptor.name) {
            Some(value) => fill_defaults(value, &descriptor.schema, resolver, 0),
            None => {
                let default = resolver
                    .resolve(&descriptor.schema)
                    .and_then(|s| s.get("default"))
                    .cloned();
                if let Some(default) = default {
                    field.insert(descriptor.name.clone(), default);
                }
            }
        }
    }
    if let Some(body) = request.body.as_mut() {
        fill_defaults(body, body_schema, resolver, 0);
    }
}

/// Replace strings whose schema `format` has a deserializer with the
/// deserialized value. Values the deserializer rejects are kept.
pub fn apply_deserializers(
    request: &mut NormalizedRequest,
    descriptors: &[ParameterDescriptor],
    body_schema: &Value,
    resolver: SchemaResolver<'_>,
    options: &ValidatorOptions,
) {
    if options.ser_des.is_empty() {
        return;
    }
    for descriptor in descriptors {
        let field = request.field_mut(descriptor.location);
        if let Some(value) = field.get_mut(&descriptor.name) {
            deserialize_value(value, &descriptor.schema, resolver, options, 0);
        }
    }
    if let Some(body) = request.body.as_mut() {
        deserialize_value(body, body_schema, resolver, options, 0);
    }
}

/// Coerce `value` in place toward `schema`.
pub fn coerce_value<'a>(
    value: &mut Value,
    schema: &'a Value,
    resolver: SchemaResolver<'a>,
    depth: usize,
) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    let Some(schema) = resolver.resolve(schema) else {
        return;
    };
    if let SchemaNode::AllOf(members) = SchemaNode::of(schema) {
        for member in members {
            coerce_value(value, member, resolver, depth + 1);
        }
        return;
    }

    let types = declared_types(schema);
    if !types.is_empty() && !types.iter().any(|t| matches_type(value, t)) {
        if let Some(coerced) = types.iter().find_map(|t| coerce_scalar(value, t)) {
            *value = coerced;
        }
    }

    match value {
        Value::Object(map) => {
            for (name, child) in map.iter_mut() {
                if let Some(sub) = resolver.property(schema, name) {
                    coerce_value(child, sub, resolver, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items.iter_mut() {
                    coerce_value(item, item_schema, resolver, depth + 1);
                }
            }
        }
        _ => {}
    }
}

fn declared_types(schema: &Value) -> Vec<&str> {
    match schema.get("type") {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_type(value: &Value, type_name: &str) -> bool {
    match (type_name, value) {
        ("string", Value::String(_))
        | ("boolean", Value::Bool(_))
        | ("null", Value::Null)
        | ("array", Value::Array(_))
        | ("object", Value::Object(_))
        | ("number", Value::Number(_)) => true,
        ("integer", Value::Number(n)) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        _ => false,
    }
}

fn coerce_scalar(value: &Value, target: &str) -> Option<Value> {
    if let Value::Array(items) = value {
        if target != "array" && items.len() == 1 {
            let inner = &items[0];
            if matches_type(inner, target) {
                return Some(inner.clone());
            }
            return coerce_scalar(inner, target);
        }
        return None;
    }
    match target {
        "number" | "integer" => to_number(value, target == "integer"),
        "string" => match value {
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            Value::Null => Some(Value::String(String::new())),
            _ => None,
        },
        "boolean" => match value {
            Value::String(s) if s == "true" => Some(Value::Bool(true)),
            Value::String(s) if s == "false" => Some(Value::Bool(false)),
            Value::Number(n) if n.as_f64() == Some(1.0) => Some(Value::Bool(true)),
            Value::Number(n) if n.as_f64() == Some(0.0) => Some(Value::Bool(false)),
            Value::Null => Some(Value::Bool(false)),
            _ => None,
        },
        "null" => match value {
            Value::String(s) if s.is_empty() => Some(Value::Null),
            Value::Number(n) if n.as_f64() == Some(0.0) => Some(Value::Null),
            Value::Bool(false) => Some(Value::Null),
            _ => None,
        },
        "array" => match value {
            Value::Object(_) => None,
            scalar => Some(Value::Array(vec![scalar.clone()])),
        },
        _ => None,
    }
}

fn to_number(value: &Value, integer: bool) -> Option<Value> {
    let number = match value {
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() || text != s {
                return None;
            }
            if let Ok(i) = text.parse::<i64>() {
                Number::from(i)
            } else if let Ok(u) = text.parse::<u64>() {
                Number::from(u)
            } else {
                let f = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Number::from(f as i64)
                } else {
                    Number::from_f64(f)?
                }
            }
        }
        Value::Bool(b) => Number::from(i64::from(*b)),
        Value::Null => Number::from(0),
        _ => return None,
    };
    if integer && !(number.is_i64() || number.is_u64()) {
        return None;
    }
    Some(Value::Number(number))
}

fn fill_defaults<'a>(
    value: &mut Value,
    schema: &'a Value,
    resolver: SchemaResolver<'a>,
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
            for (name, sub) in resolver.properties(schema) {
                match map.get_mut(name) {
                    Some(child) => fill_defaults(child, sub, resolver, depth + 1),
                    None => {
                        if let Some(default) = resolver.resolve(sub).and_then(|s| s.get("default")) {
                            map.insert(name.to_string(), default.clone());
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items.iter_mut() {
                    fill_defaults(item, item_schema, resolver, depth + 1);
                }
            }
        }
        _ => {}
    }
}

fn deserialize_value<'a>(
    value: &mut Value,
    schema: &'a Value,
    resolver: SchemaResolver<'a>,
    options: &ValidatorOptions,
    depth: usize,
) {
    if depth > MAX_REF_DEPTH {
        return;
    }
    let Some(schema) = resolver.resolve(schema) else {
        return;
    };
    match value {
        Value::String(raw) => {
            let deserializer = schema
                .get("format")
                .and_then(Value::as_str)
                .and_then(|format| options.deserializer(format));
            if let Some(deserialize) = deserializer {
                match deserialize(raw.as_str()) {
                    Ok(typed) => *value = typed,
                    Err(e) => tracing::debug!(error = %e, "deserializer rejected value"),
                }
            }
        }
        Value::Object(map) => {
            for (name, child) in map.iter_mut() {
                if let Some(sub) = resolver.property(schema, name) {
                    deserialize_value(child, sub, resolver, options, depth + 1);
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items.iter_mut() {
                    deserialize_value(item, item_schema, resolver, options, depth + 1);
                }
            }
        }
        _ => {}
    }
}

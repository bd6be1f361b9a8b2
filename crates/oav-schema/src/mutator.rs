//! # Request Parameter Normalization
//!
//! Rewrites the raw string fields of a request into the values the request
//! schema expects, following the OpenAPI serialization styles. The step is
//! pure: [`RequestParameterMutator::normalize`] reads an [`OpenApiRequest`]
//! and returns a new [`NormalizedRequest`].
//!
//! Dispatch per parameter, first matching rule wins:
//!
//! 1. `content` parameters with a JSON media type are JSON-parsed.
//! 2. Object-like query parameters: exploded `form` sibling keys and
//!    `deepObject` bracket keys are collapsed into the object, a default
//!    object is synthesized for an absent `deepObject`, and string values are
//!    JSON-parsed.
//! 3. Non-exploded arrays are split on the style's delimiter.
//! 4. Exploded arrays have a scalar wrapped into a one-element array.
//! 5. Other exploded `form` parameters get sibling collapsing, in any
//!    location.
//!
//! Empty strings and `null` are never split or wrapped.
//!
//! A value that fails to JSON-parse is left as the original string; the
//! structural check reports the type error.

use serde_json::{Map, Value};

use oav_core::{NormalizedRequest, OpenApiRequest, ParameterLocation, RequestValidationError};

use crate::node::SchemaResolver;
use crate::parameters::ParameterDescriptor;

/// Normalizes request parameters for one operation.
#[derive(Debug, Clone, Copy)]
pub struct RequestParameterMutator<'a> {
    resolver: SchemaResolver<'a>,
    route: &'a str,
}

impl<'a> RequestParameterMutator<'a> {
    pub fn new(resolver: SchemaResolver<'a>, route: &'a str) -> Self {
        Self { resolver, route }
    }

    /// Produce the normalized form of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::StructuralSpec`] when a
    /// non-exploded array parameter uses a style without a delimiter.
    pub fn normalize(
        &self,
        request: &OpenApiRequest,
        descriptors: &[ParameterDescriptor],
    ) -> Result<NormalizedRequest, RequestValidationError> {
        let mut normalized = NormalizedRequest::from_request(request);
        for descriptor in descriptors {
            self.apply(&mut normalized, descriptor)?;
        }
        Ok(normalized)
    }

    fn apply(
        &self,
        request: &mut NormalizedRequest,
        descriptor: &ParameterDescriptor,
    ) -> Result<(), RequestValidationError> {
        let name = descriptor.name.as_str();
        let schema = &descriptor.schema;
        let field = request.field_mut(descriptor.location);

        if let Some(media_type) = &descriptor.content_media_type {
            if is_json_media_type(media_type) {
                parse_json_field(field, name);
            }
            return Ok(());
        }

        let exploded_form = descriptor.style == "form" && descriptor.explode;

        if descriptor.location == ParameterLocation::Query && self.resolver.is_object_like(schema)
        {
            if exploded_form {
                parse_json_field(field, name);
                self.collapse_exploded(field, name, schema);
            } else if descriptor.style == "deepObject" {
                collapse_deep_object(field, name);
                if !field.get(name).is_some_and(is_truthy) {
                    if let Some(default) = self.resolver.default_value(schema) {
                        field.insert(name.to_string(), default);
                    }
                }
                parse_json_field(field, name);
            } else {
                parse_json_field(field, name);
            }
            return Ok(());
        }

        if self.resolver.effective_type(schema) == Some("array") {
            if descriptor.explode {
                if let Some(value) = field.get_mut(name) {
                    if is_truthy(value) && !value.is_array() {
                        *value = Value::Array(vec![value.take()]);
                    }
                }
            } else {
                let delimiter = delimiter(&descriptor.style).ok_or_else(|| {
                    RequestValidationError::structural(
                        self.route,
                        format!(
                            "Parameter 'style' has incorrect value '{}' for [{}]",
                            descriptor.style, descriptor.name
                        ),
                    )
                })?;
                if let Some(Value::String(raw)) = field.get(name).filter(|v| is_truthy(v)) {
                    let items = raw
                        .split(delimiter)
                        .map(|item| Value::String(item.to_string()))
                        .collect();
                    field.insert(name.to_string(), Value::Array(items));
                }
            }
            return Ok(());
        }

        if exploded_form {
            self.collapse_exploded(field, name, schema);
        }
        Ok(())
    }

    /// Move declared sub-properties that arrived as sibling query keys into
    /// the object under `name`.
    fn collapse_exploded(&self, field: &mut Map<String, Value>, name: &str, schema: &Value) {
        let mut collected = Map::new();
        for (property, sub_schema) in self.resolver.properties(schema) {
            if property == name {
                continue;
            }
            let Some(mut value) = field.remove(property) else {
                continue;
            };
            if self.resolver.effective_type(sub_schema) == Some("array") && !value.is_array() {
                value = Value::Array(vec![value]);
            }
            collected.insert(property.to_string(), value);
        }
        if collected.is_empty() {
            return;
        }

        match field.get_mut(name) {
            Some(Value::Object(existing)) => existing.extend(collected),
            _ => {
                field.insert(name.to_string(), Value::Object(collected));
            }
        }
    }
}

/// Collapse `name[prop]=value` keys into an object under `name`.
fn collapse_deep_object(field: &mut Map<String, Value>, name: &str) {
    let prefix = format!("{name}[");
    let bracketed: Vec<String> = field
        .keys()
        .filter(|k| k.starts_with(&prefix) && k.ends_with(']'))
        .cloned()
        .collect();
    if bracketed.is_empty() {
        return;
    }

    let mut collected = Map::new();
    for key in bracketed {
        let property = key[prefix.len()..key.len() - 1].to_string();
        if let Some(value) = field.remove(&key) {
            collected.insert(property, value);
        }
    }
    match field.get_mut(name) {
        Some(Value::Object(existing)) => existing.extend(collected),
        _ => {
            field.insert(name.to_string(), Value::Object(collected));
        }
    }
}

fn parse_json_field(field: &mut Map<String, Value>, name: &str) {
    let Some(Value::String(raw)) = field.get(name) else {
        return;
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed) => {
            field.insert(name.to_string(), parsed);
        }
        Err(e) => {
            tracing::trace!(parameter = name, error = %e, "parameter is not JSON; keeping raw string");
        }
    }
}

/// Delimiter for a non-exploded array style.
fn delimiter(style: &str) -> Option<char> {
    match style {
        "simple" | "form" => Some(','),
        "spaceDelimited" => Some(' '),
        "pipeDelimited" => Some('|'),
        _ => None,
    }
}

/// `application/json`, `text/json`, and any `+json` suffix.
fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence
        .split_once('/')
        .is_some_and(|(_, subtype)| subtype == "json" || subtype.ends_with("+json"))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn descriptor(decl: Value) -> ParameterDescriptor {
        ParameterDescriptor::from_declaration("/r", &decl).unwrap()
    }

    fn run(root: &Value, decl: Value, query: Value) -> Result<Map<String, Value>, RequestValidationError> {
        let mutator = RequestParameterMutator::new(SchemaResolver::new(root), "/r");
        let request = OpenApiRequest::new("get", "/r").with_query(query);
        mutator
            .normalize(&request, &[descriptor(decl)])
            .map(|n| n.query)
    }

    #[test]
    fn splits_delimited_arrays() {
        let root = json!({});
        for (style, raw) in [("form", "a,b,c"), ("pipeDelimited", "a|b|c"), ("spaceDelimited", "a b c")] {
            let query = run(
                &root,
                json!({ "name": "tags", "in": "query", "style": style, "explode": false,
                        "schema": { "type": "array", "items": { "type": "string" } } }),
                json!({ "tags": raw }),
            )
            .unwrap();
            assert_eq!(query["tags"], json!(["a", "b", "c"]), "style {style}");
        }
    }

    #[test]
    fn unmapped_style_is_structural() {
        let root = json!({});
        let err = run(
            &root,
            json!({ "name": "ids", "in": "query", "style": "matrix", "explode": false,
                    "schema": { "type": "array" } }),
            json!({ "ids": "1;2" }),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("Parameter 'style' has incorrect value 'matrix' for [ids]"));
    }

    #[test]
    fn wraps_exploded_scalar() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "tag", "in": "query", "schema": { "type": "array" } }),
            json!({ "tag": "x" }),
        )
        .unwrap();
        assert_eq!(query["tag"], json!(["x"]));
    }

    #[test]
    fn empty_and_null_arrays_are_left_alone() {
        let root = json!({});
        let split = run(
            &root,
            json!({ "name": "tags", "in": "query", "explode": false,
                    "schema": { "type": "array", "items": { "type": "string" } } }),
            json!({ "tags": "" }),
        )
        .unwrap();
        assert_eq!(split["tags"], "");

        let wrapped = run(
            &root,
            json!({ "name": "tag", "in": "query", "schema": { "type": "array" } }),
            json!({ "tag": null }),
        )
        .unwrap();
        assert_eq!(wrapped["tag"], Value::Null);
    }

    #[test]
    fn exploded_form_cookie_collects_siblings() {
        let root = json!({});
        let mutator = RequestParameterMutator::new(SchemaResolver::new(&root), "/r");
        let request = OpenApiRequest::new("get", "/r")
            .with_cookies(json!({ "theme": "dark", "lang": "en", "session": "s" }));
        let d = descriptor(json!({ "name": "prefs", "in": "cookie",
            "schema": { "type": "object", "properties": {
                "theme": { "type": "string" }, "lang": { "type": "string" } } } }));
        let normalized = mutator.normalize(&request, &[d]).unwrap();
        assert_eq!(normalized.cookies["prefs"], json!({ "theme": "dark", "lang": "en" }));
        assert_eq!(normalized.cookies["session"], "s");
    }

    #[test]
    fn deep_object_collapses_brackets() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "filter", "in": "query", "style": "deepObject", "explode": true,
                    "schema": { "type": "object", "properties": { "color": { "type": "string" } } } }),
            json!({ "filter[color]": "red", "filter[size]": "m" }),
        )
        .unwrap();
        assert_eq!(query["filter"], json!({ "color": "red", "size": "m" }));
        assert!(query.get("filter[color]").is_none());
    }

    #[test]
    fn deep_object_default_is_synthesized() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "filter", "in": "query", "style": "deepObject",
                    "schema": { "type": "object", "properties": { "color": { "default": "blue" } } } }),
            json!({}),
        )
        .unwrap();
        assert_eq!(query["filter"], json!({ "color": "blue" }));
    }

    #[test]
    fn exploded_form_object_collects_siblings() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "coords", "in": "query",
                    "schema": { "type": "object", "properties": {
                        "lat": { "type": "number" },
                        "tags": { "type": "array" } } } }),
            json!({ "lat": "1.5", "tags": "a", "other": "x" }),
        )
        .unwrap();
        assert_eq!(query["coords"], json!({ "lat": "1.5", "tags": ["a"] }));
        assert_eq!(query["other"], "x");
        assert!(query.get("lat").is_none());
    }

    #[test]
    fn exploded_form_without_siblings_is_untouched() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "coords", "in": "query",
                    "schema": { "type": "object", "properties": { "lat": { "type": "number" } } } }),
            json!({ "other": "x" }),
        )
        .unwrap();
        assert!(query.get("coords").is_none());
    }

    #[test]
    fn json_content_parameter_is_parsed() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "f", "in": "query",
                    "content": { "application/vnd.api+json": { "schema": { "type": "object" } } } }),
            json!({ "f": "{\"a\":1}" }),
        )
        .unwrap();
        assert_eq!(query["f"], json!({ "a": 1 }));
    }

    #[test]
    fn invalid_json_keeps_raw_string() {
        let root = json!({});
        let query = run(
            &root,
            json!({ "name": "f", "in": "query", "style": "spaceDelimited",
                    "schema": { "type": "object" } }),
            json!({ "f": "{not json" }),
        )
        .unwrap();
        assert_eq!(query["f"], "{not json");
    }

    #[test]
    fn header_arrays_split_on_commas() {
        let root = json!({});
        let mutator = RequestParameterMutator::new(SchemaResolver::new(&root), "/r");
        let request = OpenApiRequest::new("get", "/r").with_headers(json!({ "X-Ids": "1,2" }));
        let d = descriptor(json!({ "name": "X-Ids", "in": "header", "schema": { "type": "array" } }));
        let normalized = mutator.normalize(&request, &[d]).unwrap();
        assert_eq!(normalized.headers["x-ids"], json!(["1", "2"]));
    }

    #[test]
    fn json_media_type_detection() {
        assert!(is_json_media_type("application/json"));
        assert!(is_json_media_type("Application/Problem+JSON; charset=utf-8"));
        assert!(!is_json_media_type("text/plain"));
        assert!(!is_json_media_type("application/jsonl"));
    }

    proptest! {
        #[test]
        fn pipe_and_comma_styles_agree(items in proptest::collection::vec("[a-z0-9]{1,6}", 1..6)) {
            let root = json!({});
            let schema = json!({ "type": "array", "items": { "type": "string" } });
            let comma = run(
                &root,
                json!({ "name": "v", "in": "query", "style": "form", "explode": false, "schema": schema.clone() }),
                json!({ "v": items.join(",") }),
            ).unwrap();
            let pipe = run(
                &root,
                json!({ "name": "v", "in": "query", "style": "pipeDelimited", "explode": false, "schema": schema }),
                json!({ "v": items.join("|") }),
            ).unwrap();
            prop_assert_eq!(&comma["v"], &pipe["v"]);
            prop_assert_eq!(comma["v"].as_array().map(Vec::len), Some(items.len()));
        }
    }
}

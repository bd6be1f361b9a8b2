//! # Request Body Selection
//!
//! Picks the declared `requestBody` media type for a content-type class and
//! derives the body branch of the validation schema.
//!
//! Selection order over the declared media types:
//!
//! 1. an exact (case-insensitive) match of any of the content type's
//!    equivalents;
//! 2. a declared `*/*`;
//! 3. the first declared `type/*` whose type matches;
//! 4. the first declared media type.
//!
//! [`negotiate`] only needs the list of declared media types, so the
//! artifact loader can resolve keys without the original document.

use serde_json::{Map, Value};

use oav_core::content_type::is_type_wildcard;
use oav_core::ContentType;

use crate::node::SchemaResolver;
use crate::normalize::normalize_schema;
use crate::validation_schema::BodySchema;

/// Media types declared under `requestBody.content`, in document order.
pub fn declared_media_types(request_body: Option<&Value>) -> Vec<String> {
    request_body
        .and_then(|body| body.get("content"))
        .and_then(Value::as_object)
        .map(|content| content.keys().cloned().collect())
        .unwrap_or_default()
}

/// Choose one of `declared` for `content_type`. `None` only when nothing is
/// declared.
pub fn negotiate<'d>(declared: &'d [String], content_type: &ContentType) -> Option<&'d str> {
    for candidate in content_type.equivalents() {
        if let Some(found) = declared.iter().find(|d| d.eq_ignore_ascii_case(&candidate)) {
            return Some(found.as_str());
        }
    }

    if let Some(any) = declared.iter().find(|d| d.as_str() == "*/*") {
        return Some(any.as_str());
    }

    if let Some(media_type) = content_type.media_type() {
        let wildcard = declared.iter().find(|d| {
            let lowered = d.to_ascii_lowercase();
            is_type_wildcard(&lowered)
                && lowered
                    .split_once('/')
                    .is_some_and(|(kind, _)| {
                        media_type
                            .strip_prefix(kind)
                            .is_some_and(|rest| rest.len() > 1 && rest.starts_with('/'))
                    })
        });
        if let Some(found) = wildcard {
            return Some(found.as_str());
        }
    }

    declared.first().map(String::as_str)
}

/// Derives the body branch of a validation schema.
#[derive(Debug, Clone, Copy)]
pub struct BodySchemaParser<'a> {
    resolver: SchemaResolver<'a>,
}

impl<'a> BodySchemaParser<'a> {
    pub fn new(resolver: SchemaResolver<'a>) -> Self {
        Self { resolver }
    }

    /// The body branch for `content_type`, plus the selected media type.
    ///
    /// Without a declared body the branch is unconstrained and optional. A
    /// `format: binary` schema is placed as `{}` and never makes the body
    /// required. Any other schema makes the body required when
    /// `requestBody.required` is set or the schema has a `required` list.
    pub fn parse(
        &self,
        request_body: Option<&Value>,
        content_type: &ContentType,
    ) -> (BodySchema, Option<String>) {
        let declared = declared_media_types(request_body);
        let Some(selected) = negotiate(&declared, content_type) else {
            return (BodySchema::unconstrained(), None);
        };
        let body_required = request_body
            .and_then(|b| b.get("required"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let schema = request_body
            .and_then(|b| b.get("content"))
            .and_then(|c| c.get(selected))
            .and_then(|entry| entry.get("schema"))
            .map(normalize_schema)
            .unwrap_or_else(|| Value::Object(Map::new()));

        let body = self.place(schema, body_required);
        (body, Some(selected.to_string()))
    }

    fn place(&self, schema: Value, body_required: bool) -> BodySchema {
        let resolved = self.resolver.resolve(&schema).cloned();
        let target = resolved.as_ref().unwrap_or(&schema);

        if target.get("format").and_then(Value::as_str) == Some("binary") {
            return BodySchema {
                schema: Value::Object(Map::new()),
                required: false,
            };
        }

        let schema_required = target.get("required").is_some_and(Value::is_array);
        BodySchema {
            required: body_required || schema_required,
            schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn declared(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ct(header: &str) -> ContentType {
        ContentType::parse(Some(header))
    }

    #[test]
    fn exact_match_is_case_insensitive() {
        let d = declared(&["text/plain", "Application/JSON"]);
        assert_eq!(negotiate(&d, &ct("application/json")), Some("Application/JSON"));
    }

    #[test]
    fn charset_variant_matches() {
        let d = declared(&["text/plain", "application/json; charset=utf-8"]);
        assert_eq!(
            negotiate(&d, &ct("application/json")),
            Some("application/json; charset=utf-8")
        );
    }

    #[test]
    fn type_wildcard_matches_subtype() {
        let d = declared(&["application/json", "text/*"]);
        assert_eq!(negotiate(&d, &ct("text/plain")), Some("text/*"));
    }

    #[test]
    fn any_wildcard_precedes_type_wildcard() {
        let d = declared(&["text/*", "*/*"]);
        assert_eq!(negotiate(&d, &ct("text/plain")), Some("*/*"));
    }

    #[test]
    fn falls_back_to_first_declared() {
        let d = declared(&["application/xml", "application/json"]);
        assert_eq!(negotiate(&d, &ct("image/png")), Some("application/xml"));
        assert_eq!(negotiate(&d, &ContentType::parse(None)), Some("application/xml"));
        assert_eq!(negotiate(&[], &ct("image/png")), None);
    }

    #[test]
    fn wildcard_type_must_match_whole_segment() {
        let d = declared(&["application/json", "text/*"]);
        assert_eq!(negotiate(&d, &ct("textual/plain")), Some("application/json"));
    }

    #[test]
    fn binary_body_is_presence_only() {
        let root = json!({});
        let parser = BodySchemaParser::new(SchemaResolver::new(&root));
        let body = json!({
            "required": true,
            "content": { "application/octet-stream": { "schema": { "type": "string", "format": "binary" } } }
        });
        let (schema, selected) = parser.parse(Some(&body), &ct("application/octet-stream"));
        assert_eq!(schema.schema, json!({}));
        assert!(!schema.required);
        assert_eq!(selected.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn schema_required_list_requires_body() {
        let root = json!({
            "components": { "schemas": { "Pet": { "type": "object", "required": ["name"] } } }
        });
        let parser = BodySchemaParser::new(SchemaResolver::new(&root));
        let body = json!({
            "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Pet" } } }
        });
        let (schema, _) = parser.parse(Some(&body), &ct("application/json"));
        assert!(schema.required);
        assert_eq!(schema.schema, json!({ "$ref": "#/components/schemas/Pet" }));
    }

    #[test]
    fn no_body_is_unconstrained() {
        let root = json!({});
        let parser = BodySchemaParser::new(SchemaResolver::new(&root));
        let (schema, selected) = parser.parse(None, &ct("application/json"));
        assert_eq!(schema, BodySchema::unconstrained());
        assert!(selected.is_none());
    }
}

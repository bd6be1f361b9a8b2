//! # Parameter Schema Assembly
//!
//! Turns an operation's (dereferenced) parameter declarations into
//! [`ParameterDescriptor`]s and places their schemas under the matching
//! [`LocationSchema`] branch.
//!
//! Declarations that cannot be turned into a schema are structural errors:
//! an unknown `in`, a missing or ambiguous `schema`/`content`, or two
//! parameters with the same name in one location.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use oav_core::{ParameterLocation, RequestValidationError};

use crate::node::SchemaResolver;
use crate::normalize::normalize_schema;
use crate::validation_schema::ParametersSchema;

/// One declared parameter, with OpenAPI defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDescriptor {
    /// Parameter name; lower-cased for headers.
    pub name: String,
    /// Location the parameter is read from.
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    /// Serialization style; `form` for query/cookie, `simple` otherwise.
    pub style: String,
    /// Defaults to `style == "form"`.
    pub explode: bool,
    pub allow_empty_value: bool,
    /// Normalized schema, taken from `schema` or from the single `content`
    /// entry.
    pub schema: Value,
    /// Media type of the `content` entry, when the parameter uses `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_media_type: Option<String>,
}

impl ParameterDescriptor {
    /// Build a descriptor from a dereferenced parameter object.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::StructuralSpec`] for an unknown `in`
    /// value or when the parameter does not have exactly one of `schema` or a
    /// single-entry `content` map with a schema.
    pub fn from_declaration(route: &str, declaration: &Value) -> Result<Self, RequestValidationError> {
        let raw_name = declaration.get("name").and_then(Value::as_str).unwrap_or_default();
        let raw_in = declaration.get("in").and_then(Value::as_str).unwrap_or_default();

        let location: ParameterLocation = raw_in.parse().map_err(|_| {
            RequestValidationError::structural(
                route,
                format!("Parameter 'in' has incorrect value '{raw_in}' for [{raw_name}]"),
            )
        })?;

        let (schema, content_media_type) = select_schema(declaration).ok_or_else(|| {
            RequestValidationError::structural(
                route,
                format!("No available parameter in 'schema' or 'content' for [{raw_name}]"),
            )
        })?;

        let name = match location {
            ParameterLocation::Header => raw_name.to_ascii_lowercase(),
            _ => raw_name.to_string(),
        };
        let style = declaration
            .get("style")
            .and_then(Value::as_str)
            .unwrap_or(location.default_style())
            .to_string();
        let explode = declaration
            .get("explode")
            .and_then(Value::as_bool)
            .unwrap_or(style == "form");

        Ok(Self {
            name,
            location,
            required: flag(declaration, "required"),
            style,
            explode,
            allow_empty_value: flag(declaration, "allowEmptyValue"),
            schema: normalize_schema(schema),
            content_media_type,
        })
    }
}

fn flag(declaration: &Value, key: &str) -> bool {
    declaration.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn select_schema(declaration: &Value) -> Option<(&Value, Option<String>)> {
    let schema = declaration.get("schema");
    let content = declaration.get("content").and_then(Value::as_object);
    match (schema, content) {
        (Some(schema), None) => Some((schema, None)),
        (None, Some(content)) if content.len() == 1 => {
            let (media_type, entry) = content.iter().next()?;
            Some((entry.get("schema")?, Some(media_type.clone())))
        }
        _ => None,
    }
}

/// Places parameter schemas into location branches.
#[derive(Debug, Clone, Copy)]
pub struct ParametersSchemaParser<'a> {
    resolver: SchemaResolver<'a>,
    allow_unknown_query_parameters: bool,
}

impl<'a> ParametersSchemaParser<'a> {
    pub fn new(resolver: SchemaResolver<'a>, allow_unknown_query_parameters: bool) -> Self {
        Self {
            resolver,
            allow_unknown_query_parameters,
        }
    }

    /// Assemble the four parameter branches for `route`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::StructuralSpec`] when two
    /// descriptors share a name within one location.
    pub fn parse(
        &self,
        route: &str,
        descriptors: &[ParameterDescriptor],
    ) -> Result<ParametersSchema, RequestValidationError> {
        let mut schemas = ParametersSchema::new();
        let mut open_query_object = false;

        for descriptor in descriptors {
            let branch = schemas.location_mut(descriptor.location);
            if branch.declares(&descriptor.name) {
                return Err(RequestValidationError::structural(
                    route,
                    format!(
                        "Parameter '{}' is declared more than once in '{}'",
                        descriptor.name, descriptor.location
                    ),
                ));
            }

            branch
                .properties
                .insert(descriptor.name.clone(), descriptor.schema.clone());
            if descriptor.required {
                branch.required.push(descriptor.name.clone());
            }
            if descriptor.location == ParameterLocation::Query {
                if descriptor.allow_empty_value {
                    branch.allow_empty_value.insert(descriptor.name.clone());
                }
                open_query_object |= self.is_open_object(&descriptor.schema, 0);
            }
        }

        schemas.query.additional_properties =
            self.allow_unknown_query_parameters || open_query_object;
        Ok(schemas)
    }

    /// An object schema with an explicit `additionalProperties` other than
    /// `false`, directly or in a composition member.
    fn is_open_object(&self, schema: &Value, depth: usize) -> bool {
        if depth > crate::document::MAX_REF_DEPTH {
            return false;
        }
        let Some(schema) = self.resolver.resolve(schema) else {
            return false;
        };
        if schema
            .get("additionalProperties")
            .is_some_and(|ap| *ap != Value::Bool(false))
        {
            return true;
        }
        ["allOf", "oneOf", "anyOf"].iter().any(|key| {
            schema
                .get(*key)
                .and_then(Value::as_array)
                .is_some_and(|members| members.iter().any(|m| self.is_open_object(m, depth + 1)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(decl: Value) -> ParameterDescriptor {
        ParameterDescriptor::from_declaration("/r", &decl).unwrap()
    }

    #[test]
    fn applies_openapi_defaults() {
        let q = descriptor(json!({ "name": "tags", "in": "query", "schema": { "type": "array" } }));
        assert_eq!(q.style, "form");
        assert!(q.explode);
        assert!(!q.required);

        let p = descriptor(json!({ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }));
        assert_eq!(p.style, "simple");
        assert!(!p.explode);
        assert!(p.required);
    }

    #[test]
    fn header_names_are_lower_cased() {
        let h = descriptor(json!({ "name": "X-Request-ID", "in": "header", "schema": { "type": "string" } }));
        assert_eq!(h.name, "x-request-id");
    }

    #[test]
    fn content_parameters_keep_media_type() {
        let c = descriptor(json!({
            "name": "filter",
            "in": "query",
            "content": { "application/json": { "schema": { "type": "object" } } }
        }));
        assert_eq!(c.content_media_type.as_deref(), Some("application/json"));
        assert_eq!(c.schema, json!({ "type": "object" }));
    }

    #[test]
    fn unknown_location_is_rejected() {
        let err = ParameterDescriptor::from_declaration(
            "/r",
            &json!({ "name": "x", "in": "body", "schema": {} }),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid declaration for route /r: Parameter 'in' has incorrect value 'body' for [x]"
        );
    }

    #[test]
    fn schema_and_content_are_exclusive() {
        for decl in [
            json!({ "name": "x", "in": "query" }),
            json!({ "name": "x", "in": "query", "schema": {}, "content": { "a/b": { "schema": {} } } }),
            json!({ "name": "x", "in": "query", "content": { "a/b": { "schema": {} }, "c/d": { "schema": {} } } }),
        ] {
            let err = ParameterDescriptor::from_declaration("/r", &decl).unwrap_err();
            assert!(err.to_string().contains("No available parameter in 'schema' or 'content' for [x]"));
        }
    }

    #[test]
    fn places_parameters_by_location() {
        let root = json!({});
        let parser = ParametersSchemaParser::new(SchemaResolver::new(&root), false);
        let descriptors = vec![
            descriptor(json!({ "name": "petId", "in": "path", "required": true, "schema": { "type": "integer" } })),
            descriptor(json!({ "name": "q", "in": "query", "allowEmptyValue": true, "schema": { "type": "string" } })),
            descriptor(json!({ "name": "session", "in": "cookie", "schema": { "type": "string" } })),
        ];
        let schema = parser.parse("/r", &descriptors).unwrap();
        assert_eq!(schema.path.required, vec!["petId"]);
        assert!(schema.query.allow_empty_value.contains("q"));
        assert!(schema.cookies.declares("session"));
        assert!(!schema.query.additional_properties);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let root = json!({});
        let parser = ParametersSchemaParser::new(SchemaResolver::new(&root), false);
        let descriptors = vec![
            descriptor(json!({ "name": "X-A", "in": "header", "schema": {} })),
            descriptor(json!({ "name": "x-a", "in": "header", "schema": {} })),
        ];
        let err = parser.parse("/r", &descriptors).unwrap_err();
        assert!(matches!(err, RequestValidationError::StructuralSpec { .. }));
    }

    #[test]
    fn open_object_parameter_opens_query() {
        let root = json!({
            "components": { "schemas": { "Bag": { "type": "object", "additionalProperties": true } } }
        });
        let parser = ParametersSchemaParser::new(SchemaResolver::new(&root), false);
        let descriptors = vec![descriptor(json!({
            "name": "bag", "in": "query", "schema": { "$ref": "#/components/schemas/Bag" }
        }))];
        assert!(parser.parse("/r", &descriptors).unwrap().query.additional_properties);
    }

    #[test]
    fn allow_unknown_opens_query() {
        let root = json!({});
        let parser = ParametersSchemaParser::new(SchemaResolver::new(&root), true);
        assert!(parser.parse("/r", &[]).unwrap().query.additional_properties);
    }
}

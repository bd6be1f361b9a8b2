//! # Per-Operation Validator
//!
//! A [`Validator`] owns the compiled predicate for one operation key and
//! runs the request pipeline: style normalization, coercion and defaults,
//! query-name checks, `removeAdditional` pruning, the engine check, error
//! translation, and finally custom deserializers.

use std::sync::Arc;

use oav_core::{
    BadRequest, NormalizedRequest, OpenApiRequest, OperationKey, RequestValidationError,
    SchemaFingerprint, ValidationErrorItem, ValidatorOptions,
};

use crate::coerce;
use crate::engine::CompiledSchema;
use crate::mutator::RequestParameterMutator;
use crate::node::SchemaResolver;
use crate::parameters::ParameterDescriptor;
use crate::prune::prune;
use crate::translate;
use crate::validation_schema::ValidationSchema;

/// Where a validator's schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorOrigin {
    /// Assembled from the document on first use.
    Live,
    /// Read from a compiled artifact.
    Artifact,
}

/// Compiled validator for one `(method, route, content class)`.
#[derive(Debug)]
pub struct Validator {
    key: OperationKey,
    method: String,
    route: String,
    content_class: String,
    media_type: Option<String>,
    origin: ValidatorOrigin,
    descriptors: Vec<ParameterDescriptor>,
    schema: ValidationSchema,
    fingerprint: SchemaFingerprint,
    compiled: Arc<CompiledSchema>,
}

/// Inputs for [`Validator::new`].
#[derive(Debug)]
pub struct ValidatorParts {
    pub key: OperationKey,
    pub method: String,
    pub route: String,
    pub content_class: String,
    pub media_type: Option<String>,
    pub origin: ValidatorOrigin,
    pub descriptors: Vec<ParameterDescriptor>,
    pub schema: ValidationSchema,
    pub fingerprint: SchemaFingerprint,
    pub compiled: Arc<CompiledSchema>,
}

impl Validator {
    pub fn new(parts: ValidatorParts) -> Self {
        Self {
            key: parts.key,
            method: parts.method,
            route: parts.route,
            content_class: parts.content_class,
            media_type: parts.media_type,
            origin: parts.origin,
            descriptors: parts.descriptors,
            schema: parts.schema,
            fingerprint: parts.fingerprint,
            compiled: parts.compiled,
        }
    }

    pub fn key(&self) -> &OperationKey {
        &self.key
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Content-type class of the key.
    pub fn content_class(&self) -> &str {
        &self.content_class
    }

    /// Declared body media type selected for this key, if the operation has
    /// a body.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn origin(&self) -> ValidatorOrigin {
        self.origin
    }

    pub fn descriptors(&self) -> &[ParameterDescriptor] {
        &self.descriptors
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    pub fn fingerprint(&self) -> &SchemaFingerprint {
        &self.fingerprint
    }

    /// The shared compiled predicate.
    pub fn compiled(&self) -> &Arc<CompiledSchema> {
        &self.compiled
    }

    /// Validate `request` and return its normalized form.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::BadRequest`] when the request does
    /// not conform, and [`RequestValidationError::StructuralSpec`] when a
    /// parameter style cannot be decoded.
    pub fn validate(
        &self,
        request: &OpenApiRequest,
        options: &ValidatorOptions,
    ) -> Result<NormalizedRequest, RequestValidationError> {
        let resolver = SchemaResolver::new(self.compiled.schema());
        let body_schema = &self.schema.body.schema;

        let mut normalized =
            RequestParameterMutator::new(resolver, &self.route).normalize(request, &self.descriptors)?;
        coerce::coerce_parameters(&mut normalized, &self.descriptors, resolver);
        coerce::apply_defaults(&mut normalized, &self.descriptors, body_schema, resolver);

        self.check_unknown_query(&normalized)?;
        self.check_empty_query(request)?;

        let mut instance = normalized.to_instance();
        prune(&mut instance, self.compiled.schema(), options.remove_additional);

        let errors = self.compiled.errors(&instance);
        if !errors.is_empty() {
            tracing::debug!(key = %self.key, errors = errors.len(), "request rejected");
            return Err(translate::bad_request(&self.route, &errors).into());
        }

        normalized.replace_from_instance(instance);
        coerce::apply_deserializers(
            &mut normalized,
            &self.descriptors,
            body_schema,
            resolver,
            options,
        );
        Ok(normalized)
    }

    fn check_unknown_query(&self, request: &NormalizedRequest) -> Result<(), BadRequest> {
        let query = &self.schema.parameters.query;
        if query.additional_properties {
            return Ok(());
        }
        let items: Vec<ValidationErrorItem> = request
            .query
            .keys()
            .filter(|name| !query.declares(name))
            .map(|name| {
                ValidationErrorItem::new(
                    format!(".query.{name}"),
                    format!("Unknown query parameter '{name}'"),
                )
            })
            .collect();
        if items.is_empty() {
            Ok(())
        } else {
            Err(BadRequest::from_items(&self.route, items))
        }
    }

    fn check_empty_query(&self, request: &OpenApiRequest) -> Result<(), BadRequest> {
        let query = &self.schema.parameters.query;
        let Some(raw) = request.query.as_ref() else {
            return Ok(());
        };
        let items: Vec<ValidationErrorItem> = raw
            .iter()
            .filter(|(name, value)| {
                query.declares(name)
                    && !query.allow_empty_value.contains(name.as_str())
                    && value.as_str() == Some("")
            })
            .map(|(name, _)| {
                ValidationErrorItem::new(
                    format!(".query.{name}"),
                    format!("Empty value found for query parameter '{name}'"),
                )
            })
            .collect();
        if items.is_empty() {
            Ok(())
        } else {
            Err(BadRequest::from_items(&self.route, items))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SchemaEngine;
    use crate::parameters::ParametersSchemaParser;
    use crate::validation_schema::BodySchema;
    use oav_core::{fingerprint, ContentType, RemoveAdditional};
    use serde_json::{json, Value};

    fn validator(declarations: Vec<Value>, body: BodySchema) -> Validator {
        let components = json!({ "schemas": {} });
        let root = json!({ "components": components });
        let descriptors: Vec<ParameterDescriptor> = declarations
            .iter()
            .map(|d| ParameterDescriptor::from_declaration("/r", d).unwrap())
            .collect();
        let parameters = ParametersSchemaParser::new(SchemaResolver::new(&root), false)
            .parse("/r", &descriptors)
            .unwrap();
        let schema = ValidationSchema::new(parameters, body);
        let compiled = SchemaEngine::new(&ValidatorOptions::default())
            .compile(schema.to_engine_schema(&components))
            .unwrap();
        Validator::new(ValidatorParts {
            key: OperationKey::new("get", "/r", &ContentType::parse(None)),
            method: "get".into(),
            route: "/r".into(),
            content_class: "not_provided".into(),
            media_type: None,
            origin: ValidatorOrigin::Live,
            descriptors,
            fingerprint: fingerprint(&schema).unwrap(),
            schema,
            compiled: Arc::new(compiled),
        })
    }

    fn limit_param() -> Value {
        json!({ "name": "limit", "in": "query", "schema": { "type": "integer", "maximum": 100 } })
    }

    #[test]
    fn coerces_and_accepts() {
        let v = validator(vec![limit_param()], BodySchema::unconstrained());
        let request = OpenApiRequest::new("get", "/r").with_query(json!({ "limit": "10" }));
        let normalized = v.validate(&request, &ValidatorOptions::default()).unwrap();
        assert_eq!(normalized.query["limit"], json!(10));
    }

    #[test]
    fn rejects_with_translated_items() {
        let v = validator(vec![limit_param()], BodySchema::unconstrained());
        let request = OpenApiRequest::new("get", "/r").with_query(json!({ "limit": "500" }));
        let err = v.validate(&request, &ValidatorOptions::default()).unwrap_err();
        let bad = err.as_bad_request().unwrap();
        assert_eq!(bad.errors[0].path, ".query.limit");
        assert_eq!(bad.errors[0].message, "must be <= 100");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn unknown_query_parameter_is_named() {
        let v = validator(vec![limit_param()], BodySchema::unconstrained());
        let request = OpenApiRequest::new("get", "/r").with_query(json!({ "limti": "1" }));
        let err = v.validate(&request, &ValidatorOptions::default()).unwrap_err();
        let bad = err.as_bad_request().unwrap();
        assert_eq!(bad.errors[0].path, ".query.limti");
        assert_eq!(bad.summary_message, "Unknown query parameter 'limti'");
    }

    #[test]
    fn empty_value_is_rejected_unless_allowed() {
        let v = validator(
            vec![
                json!({ "name": "q", "in": "query", "schema": { "type": "string" } }),
                json!({ "name": "cursor", "in": "query", "allowEmptyValue": true, "schema": { "type": "string" } }),
            ],
            BodySchema::unconstrained(),
        );
        let ok = OpenApiRequest::new("get", "/r").with_query(json!({ "cursor": "" }));
        assert!(v.validate(&ok, &ValidatorOptions::default()).is_ok());

        let bad = OpenApiRequest::new("get", "/r").with_query(json!({ "q": "" }));
        let err = v.validate(&bad, &ValidatorOptions::default()).unwrap_err();
        assert_eq!(
            err.as_bad_request().unwrap().errors[0].message,
            "Empty value found for query parameter 'q'"
        );
    }

    #[test]
    fn remove_additional_strips_body_properties() {
        let body = BodySchema {
            schema: json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "additionalProperties": false
            }),
            required: true,
        };
        let v = validator(vec![], body);
        let request = OpenApiRequest::new("get", "/r").with_body(json!({ "name": "rex", "x": 1 }));

        assert!(v.validate(&request, &ValidatorOptions::default()).is_err());

        let options = ValidatorOptions {
            remove_additional: RemoveAdditional::Declared,
            ..ValidatorOptions::default()
        };
        let normalized = v.validate(&request, &options).unwrap();
        assert_eq!(normalized.body, Some(json!({ "name": "rex" })));
    }

    #[test]
    fn missing_required_body() {
        let body = BodySchema {
            schema: json!({ "type": "object" }),
            required: true,
        };
        let v = validator(vec![], body);
        let err = v
            .validate(&OpenApiRequest::new("get", "/r"), &ValidatorOptions::default())
            .unwrap_err();
        let bad = err.as_bad_request().unwrap();
        assert_eq!(bad.errors[0].path, ".body");
        assert_eq!(bad.errors[0].message, "must have required property 'body'");
    }
}

//! # Operation Plans
//!
//! An [`OperationPlan`] is everything about one operation that does not
//! depend on the request's content type: the parameter descriptors, the
//! assembled parameter branches, and the declared request body. The live
//! cache and the artifact compiler both build plans and then derive one
//! [`ValidationSchema`] per content-type class from them, so the two paths
//! cannot drift apart.

use serde_json::Value;

use oav_core::content_type::NOT_PROVIDED;
use oav_core::{ContentType, RequestValidationError};

use crate::body::{declared_media_types, BodySchemaParser};
use crate::document::{ApiDocument, Operation};
use crate::node::SchemaResolver;
use crate::parameters::{ParameterDescriptor, ParametersSchemaParser};
use crate::validation_schema::{ParametersSchema, ValidationSchema};

/// Content-type independent view of one operation.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    /// Lower-case HTTP method as declared.
    pub method: String,
    /// Route template.
    pub route: String,
    /// Parameter descriptors, path-item parameters merged in.
    pub descriptors: Vec<ParameterDescriptor>,
    /// Media types declared under `requestBody.content`.
    pub media_types: Vec<String>,
    parameters: ParametersSchema,
    request_body: Option<Value>,
}

impl OperationPlan {
    /// Assemble the plan for `op`.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::StructuralSpec`] for parameter
    /// declarations that cannot be turned into a schema.
    pub fn assemble(
        document: &ApiDocument,
        op: &Operation<'_>,
        resolver: SchemaResolver<'_>,
        allow_unknown_query_parameters: bool,
    ) -> Result<Self, RequestValidationError> {
        let descriptors = document
            .parameters(op)?
            .iter()
            .map(|declaration| ParameterDescriptor::from_declaration(op.route, declaration))
            .collect::<Result<Vec<_>, _>>()?;
        let parameters = ParametersSchemaParser::new(resolver, allow_unknown_query_parameters)
            .parse(op.route, &descriptors)?;
        let request_body = document.request_body(op)?.cloned();

        Ok(Self {
            method: op.method.to_string(),
            route: op.route.to_string(),
            descriptors,
            media_types: declared_media_types(request_body.as_ref()),
            parameters,
            request_body,
        })
    }

    /// The validation schema for `content_type`, plus the selected body media
    /// type.
    pub fn schema_for(
        &self,
        resolver: SchemaResolver<'_>,
        content_type: &ContentType,
    ) -> (ValidationSchema, Option<String>) {
        let (body, selected) =
            BodySchemaParser::new(resolver).parse(self.request_body.as_ref(), content_type);
        (ValidationSchema::new(self.parameters.clone(), body), selected)
    }

    /// Every content-type class worth compiling ahead of time: the class of
    /// each declared media type, then the absent header.
    pub fn content_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = Vec::new();
        let declared = self
            .media_types
            .iter()
            .map(|m| ContentType::parse(Some(m.as_str())).key_class());
        for class in declared.chain(std::iter::once(NOT_PROVIDED.to_string())) {
            if !classes.contains(&class) {
                classes.push(class);
            }
        }
        classes
    }
}

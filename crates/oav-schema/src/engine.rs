//! # Schema Engine
//!
//! The seam to the JSON-Schema compiler, realised by the `jsonschema` crate
//! (Draft 7). A [`SchemaEngine`] is built from [`ValidatorOptions`] and owned
//! by each request validator; there is no process-wide engine state.
//!
//! ## Reference Resolution
//!
//! Compiled schemas embed the document's `components`, so `#/components/...`
//! references resolve inside the schema itself. Anything else (`http://`,
//! `file://`, relative URIs) reaches [`LocalRetriever`], which refuses it.
//!
//! ## Native Errors
//!
//! Engine errors are flattened into [`NativeError`]s: the failing keyword,
//! the instance and schema locations, and the keyword's value looked up in
//! the compiled schema. Error translation works from these fields only.

use std::collections::BTreeMap;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Retrieve, Uri, ValidationError, Validator};
use serde_json::Value;
use thiserror::Error;

use oav_core::options::FormatPredicate;
use oav_core::{FormatType, ValidatorOptions};

use crate::document::{resolve_pointer, MAX_REF_DEPTH};

/// Identifies the engine and dialect an artifact was compiled for.
pub const ENGINE_STAMP: &str = "jsonschema-0.28/draft7";

/// Failure to compile a schema.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine rejected the schema.
    #[error("schema compilation failed: {0}")]
    Compile(String),
}

#[derive(Error, Debug)]
#[error("external reference '{0}' cannot be resolved; only local '#/...' references are supported")]
struct ExternalReference(String);

/// Retriever that refuses every external reference.
struct LocalRetriever;

impl Retrieve for LocalRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(Box::new(ExternalReference(uri.as_str().to_string())))
    }
}

/// Compiles request schemas with the configured formats.
#[derive(Clone)]
pub struct SchemaEngine {
    formats: BTreeMap<String, FormatPredicate>,
    validate_formats: bool,
}

impl std::fmt::Debug for SchemaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEngine")
            .field("formats", &self.formats.keys().collect::<Vec<_>>())
            .field("validate_formats", &self.validate_formats)
            .finish()
    }
}

impl SchemaEngine {
    /// Register custom formats and deserializer-backed formats. A
    /// deserializer's success is its format predicate and overrides a custom
    /// format of the same name.
    pub fn new(options: &ValidatorOptions) -> Self {
        let mut formats: BTreeMap<String, FormatPredicate> = BTreeMap::new();
        for format in &options.formats {
            if format.format_type == FormatType::Number {
                tracing::debug!(
                    format = %format.name,
                    "number format registered; formats are only evaluated on strings"
                );
            }
            formats.insert(format.name.clone(), Arc::clone(&format.predicate));
        }
        for ser_des in &options.ser_des {
            let deserialize = Arc::clone(&ser_des.deserialize);
            formats.insert(
                ser_des.format.clone(),
                Arc::new(move |value: &str| deserialize(value).is_ok()),
            );
        }
        Self {
            formats,
            validate_formats: options.validate_formats,
        }
    }

    /// Compile `schema` into an executable predicate.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Compile`] if the engine rejects the schema,
    /// including unresolvable references.
    pub fn compile(&self, schema: Value) -> Result<CompiledSchema, EngineError> {
        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft7);
        opts.with_retriever(LocalRetriever);
        opts.should_validate_formats(self.validate_formats);
        for (name, predicate) in &self.formats {
            let predicate = Arc::clone(predicate);
            opts.with_format(name.clone(), move |value: &str| predicate(value));
        }

        let validator = opts
            .build(&schema)
            .map_err(|e| EngineError::Compile(e.to_string()))?;
        Ok(CompiledSchema { schema, validator })
    }
}

/// A compiled request schema.
pub struct CompiledSchema {
    schema: Value,
    validator: Validator,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").finish_non_exhaustive()
    }
}

impl CompiledSchema {
    /// The schema this predicate was compiled from.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Whether `instance` satisfies the schema.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Every failure for `instance`, in engine order.
    pub fn errors(&self, instance: &Value) -> Vec<NativeError> {
        self.validator
            .iter_errors(instance)
            .map(|error| NativeError::from_engine(&error, &self.schema))
            .collect()
    }
}

/// An engine failure reduced to what error translation needs.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeError {
    /// The failing keyword, e.g. `required` or `maxLength`.
    pub keyword: String,
    /// JSON pointer into the request instance, e.g. `/query/limit`.
    pub instance_path: String,
    /// JSON pointer into the compiled schema.
    pub schema_path: String,
    /// Value of the failing keyword in the compiled schema.
    pub keyword_value: Option<Value>,
    /// For `required`: the missing property.
    pub missing_property: Option<String>,
    /// For `additionalProperties`: the undeclared properties.
    pub unexpected_properties: Vec<String>,
    /// The engine's own description, used when no better wording exists.
    pub engine_message: String,
}

impl NativeError {
    fn from_engine(error: &ValidationError<'_>, root: &Value) -> Self {
        let schema_path = error.schema_path.to_string();
        let keyword = schema_path
            .rsplit('/')
            .next()
            .map(unescape_segment)
            .unwrap_or_default();

        let (missing_property, unexpected_properties) = match &error.kind {
            ValidationErrorKind::Required { property } => {
                (property.as_str().map(str::to_string), Vec::new())
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => (None, unexpected.clone()),
            _ => (None, Vec::new()),
        };

        Self {
            keyword_value: lookup_schema_path(root, &schema_path),
            keyword,
            instance_path: error.instance_path.to_string(),
            schema_path,
            missing_property,
            unexpected_properties,
            engine_message: error.to_string(),
        }
    }
}

fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Walk a schema location from `root`, following `$ref` hops, whether or not
/// the location spells them out.
fn lookup_schema_path(root: &Value, schema_path: &str) -> Option<Value> {
    let mut node = root;
    for raw in schema_path.split('/').skip(1) {
        let segment = unescape_segment(raw);
        node = step(root, node, &segment)?;
    }
    Some(node.clone())
}

fn step<'v>(root: &'v Value, mut node: &'v Value, segment: &str) -> Option<&'v Value> {
    for _ in 0..=MAX_REF_DEPTH {
        let reference = node.get("$ref").and_then(Value::as_str);
        if segment == "$ref" {
            if let Some(reference) = reference {
                return resolve_pointer(root, reference);
            }
        }
        let found = match node {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
        node = resolve_pointer(root, reference?)?;
    }
    None
}

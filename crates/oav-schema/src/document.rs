//! # OpenAPI Document Access
//!
//! Loads an OpenAPI 3 document from disk (JSON or YAML) or from memory and
//! exposes the pieces request validation needs: operations by
//! `(method, route)`, merged and dereferenced parameter lists, request bodies,
//! and the `components` object that every compiled schema embeds so that
//! `#/components/...` references resolve inside the engine.
//!
//! Schemas under `components/schemas` are rewritten into the engine dialect
//! once, at load time (see [`crate::normalize`]).

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use oav_core::RequestValidationError;

use crate::normalize::normalize_schema;

/// HTTP methods an OpenAPI path item may declare.
pub const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Maximum number of `$ref` hops followed before giving up.
pub const MAX_REF_DEPTH: usize = 32;

/// Where the OpenAPI document comes from.
#[derive(Debug, Clone)]
pub enum ApiSpecSource {
    /// An already parsed document.
    Document(Value),
    /// A `.json`, `.yaml` or `.yml` file.
    File(PathBuf),
}

impl From<Value> for ApiSpecSource {
    fn from(value: Value) -> Self {
        Self::Document(value)
    }
}

impl From<PathBuf> for ApiSpecSource {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<&Path> for ApiSpecSource {
    fn from(path: &Path) -> Self {
        Self::File(path.to_path_buf())
    }
}

/// One operation of the document.
#[derive(Debug, Clone, Copy)]
pub struct Operation<'a> {
    /// Lower-case HTTP method.
    pub method: &'static str,
    /// Route template as written under `paths`.
    pub route: &'a str,
    /// The path item holding the operation.
    pub path_item: &'a Value,
    /// The operation object.
    pub operation: &'a Value,
}

/// A loaded OpenAPI document.
#[derive(Debug, Clone)]
pub struct ApiDocument {
    root: Value,
}

impl ApiDocument {
    /// Load a document from any [`ApiSpecSource`].
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::Configuration`] if the file cannot be
    /// read or parsed, or the document is not an OpenAPI 3 document.
    pub async fn load(source: ApiSpecSource) -> Result<Self, RequestValidationError> {
        match source {
            ApiSpecSource::Document(value) => Self::from_value(value),
            ApiSpecSource::File(path) => {
                let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    RequestValidationError::Configuration(format!(
                        "cannot read specification {}: {e}",
                        path.display()
                    ))
                })?;
                let value = parse_document(&path, &content)?;
                tracing::debug!(path = %path.display(), "loaded OpenAPI document");
                Self::from_value(value)
            }
        }
    }

    /// Wrap a parsed document after a structural sanity check.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::Configuration`] unless the document
    /// declares `openapi: 3.x` and has a `paths` object.
    pub fn from_value(mut root: Value) -> Result<Self, RequestValidationError> {
        let version = root
            .get("openapi")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RequestValidationError::Configuration(
                    "document has no 'openapi' version field".into(),
                )
            })?;
        if !version.starts_with("3.") {
            return Err(RequestValidationError::Configuration(format!(
                "unsupported OpenAPI version '{version}', expected 3.x"
            )));
        }
        if !root.get("paths").is_some_and(Value::is_object) {
            return Err(RequestValidationError::Configuration(
                "document has no 'paths' object".into(),
            ));
        }

        if let Some(Value::Object(components)) = root.get_mut("components") {
            if let Some(Value::Object(schemas)) = components.get_mut("schemas") {
                for schema in schemas.values_mut() {
                    *schema = normalize_schema(schema);
                }
            }
        }

        Ok(Self { root })
    }

    /// The raw document.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The `components` object, or an empty object.
    pub fn components(&self) -> Value {
        self.root
            .get("components")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Look up an operation. The method is matched case-insensitively, the
    /// route exactly.
    pub fn operation(&self, method: &str, route: &str) -> Option<Operation<'_>> {
        let (route, path_item) = self
            .root
            .get("paths")?
            .as_object()?
            .iter()
            .find(|(template, _)| template.as_str() == route)?;
        let method = HTTP_METHODS
            .iter()
            .copied()
            .find(|m| m.eq_ignore_ascii_case(method))?;
        let operation = path_item.get(method).filter(|op| op.is_object())?;
        Some(Operation {
            method,
            route,
            path_item,
            operation,
        })
    }

    /// Every declared operation, in document order.
    pub fn operations(&self) -> Vec<Operation<'_>> {
        let Some(paths) = self.root.get("paths").and_then(Value::as_object) else {
            return Vec::new();
        };
        let mut operations = Vec::new();
        for (route, path_item) in paths {
            let Some(item) = path_item.as_object() else {
                continue;
            };
            for (name, operation) in item {
                let Some(method) = HTTP_METHODS.iter().copied().find(|m| *m == name.as_str())
                else {
                    continue;
                };
                if operation.is_object() {
                    operations.push(Operation {
                        method,
                        route,
                        path_item,
                        operation,
                    });
                }
            }
        }
        operations
    }

    /// Follow `$ref` indirection until a concrete object is reached.
    ///
    /// # Errors
    ///
    /// Returns [`RequestValidationError::StructuralSpec`] for dangling
    /// references or chains longer than [`MAX_REF_DEPTH`].
    pub fn dereference<'a>(
        &'a self,
        route: &str,
        mut value: &'a Value,
    ) -> Result<&'a Value, RequestValidationError> {
        for _ in 0..MAX_REF_DEPTH {
            let Some(reference) = value.get("$ref").and_then(Value::as_str) else {
                return Ok(value);
            };
            value = resolve_pointer(&self.root, reference).ok_or_else(|| {
                RequestValidationError::structural(
                    route,
                    format!("cannot resolve reference '{reference}'"),
                )
            })?;
        }
        Err(RequestValidationError::structural(
            route,
            format!("reference chain exceeds {MAX_REF_DEPTH} hops"),
        ))
    }

    /// The operation's parameters, with path-item parameters merged in.
    ///
    /// An operation-level parameter overrides a path-level one with the same
    /// `(name, in)`. Duplicates within one list are kept so that schema
    /// assembly can reject them.
    pub fn parameters(&self, op: &Operation<'_>) -> Result<Vec<Value>, RequestValidationError> {
        let path_level = self.parameter_list(op.route, op.path_item)?;
        let op_level = self.parameter_list(op.route, op.operation)?;

        let mut merged: Vec<Value> = path_level
            .into_iter()
            .filter(|p| !op_level.iter().any(|o| same_parameter(p, o)))
            .collect();
        merged.extend(op_level);
        Ok(merged)
    }

    /// The operation's dereferenced `requestBody`, if any.
    pub fn request_body<'a>(
        &'a self,
        op: &Operation<'a>,
    ) -> Result<Option<&'a Value>, RequestValidationError> {
        match op.operation.get("requestBody") {
            Some(body) => self.dereference(op.route, body).map(Some),
            None => Ok(None),
        }
    }

    fn parameter_list(
        &self,
        route: &str,
        holder: &Value,
    ) -> Result<Vec<Value>, RequestValidationError> {
        let Some(list) = holder.get("parameters") else {
            return Ok(Vec::new());
        };
        let Some(list) = list.as_array() else {
            return Err(RequestValidationError::structural(
                route,
                "'parameters' must be an array",
            ));
        };
        list.iter()
            .map(|p| self.dereference(route, p).cloned())
            .collect()
    }
}

fn same_parameter(a: &Value, b: &Value) -> bool {
    a.get("name") == b.get("name") && a.get("in") == b.get("in")
}

/// Resolve a local `#/...` JSON pointer against `root`.
pub fn resolve_pointer<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    if pointer.is_empty() {
        return Some(root);
    }
    root.pointer(pointer)
}

fn parse_document(path: &Path, content: &str) -> Result<Value, RequestValidationError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| {
            RequestValidationError::Configuration(format!(
                "invalid YAML in {}: {e}",
                path.display()
            ))
        }),
        _ => serde_json::from_str(content).map_err(|e| {
            RequestValidationError::Configuration(format!(
                "invalid JSON in {}: {e}",
                path.display()
            ))
        }),
    }
}

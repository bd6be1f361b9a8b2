//! # Validation Schemas
//!
//! A [`ValidationSchema`] describes the legal shape of one operation for one
//! content-type class: four parameter branches plus the request body. It is
//! the unit that is fingerprinted, stored in artifacts, and turned into the
//! single combined engine schema by [`ValidationSchema::to_engine_schema`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use oav_core::ParameterLocation;

/// Schema of one parameter location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSchema {
    /// Human-readable title, e.g. `HTTP query`.
    pub title: String,
    /// Parameter schemas keyed by parameter name.
    pub properties: Map<String, Value>,
    /// Names of required parameters, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    /// Whether undeclared names are accepted.
    pub additional_properties: bool,
    /// Query parameters allowed to carry an empty string. Checked outside the
    /// engine.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allow_empty_value: BTreeSet<String>,
}

impl LocationSchema {
    /// An empty schema with the default policy for `location`: headers are
    /// open, everything else closed.
    pub fn new(location: ParameterLocation) -> Self {
        let title = match location {
            ParameterLocation::Query => "HTTP query",
            ParameterLocation::Header => "HTTP headers",
            ParameterLocation::Path => "HTTP path",
            ParameterLocation::Cookie => "HTTP cookies",
        };
        Self {
            title: title.to_string(),
            properties: Map::new(),
            required: Vec::new(),
            additional_properties: location == ParameterLocation::Header,
            allow_empty_value: BTreeSet::new(),
        }
    }

    /// Whether `name` is a declared parameter.
    pub fn declares(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// The JSON schema handed to the engine.
    pub fn to_engine_schema(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("title".into(), Value::from(self.title.clone()));
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(self.properties.clone()));
        if !self.required.is_empty() {
            schema.insert("required".into(), json!(self.required));
        }
        schema.insert(
            "additionalProperties".into(),
            Value::Bool(self.additional_properties),
        );
        Value::Object(schema)
    }
}

/// Schema of the request body for one negotiated media type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodySchema {
    /// Schema placed under `body`. Binary bodies are placed as `{}`.
    pub schema: Value,
    /// Whether `body` must be present.
    pub required: bool,
}

impl BodySchema {
    /// An unconstrained, optional body.
    pub fn unconstrained() -> Self {
        Self {
            schema: Value::Object(Map::new()),
            required: false,
        }
    }
}

impl Default for BodySchema {
    fn default() -> Self {
        Self::unconstrained()
    }
}

/// The four parameter branches of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersSchema {
    pub query: LocationSchema,
    pub headers: LocationSchema,
    pub path: LocationSchema,
    pub cookies: LocationSchema,
}

impl ParametersSchema {
    /// Empty branches with default policies.
    pub fn new() -> Self {
        Self {
            query: LocationSchema::new(ParameterLocation::Query),
            headers: LocationSchema::new(ParameterLocation::Header),
            path: LocationSchema::new(ParameterLocation::Path),
            cookies: LocationSchema::new(ParameterLocation::Cookie),
        }
    }

    /// The branch for `location`.
    pub fn location(&self, location: ParameterLocation) -> &LocationSchema {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.headers,
            ParameterLocation::Path => &self.path,
            ParameterLocation::Cookie => &self.cookies,
        }
    }

    /// Mutable access to the branch for `location`.
    pub fn location_mut(&mut self, location: ParameterLocation) -> &mut LocationSchema {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Path => &mut self.path,
            ParameterLocation::Cookie => &mut self.cookies,
        }
    }
}

impl Default for ParametersSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete shape of one `(operation, content class)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSchema {
    /// Parameter branches.
    pub parameters: ParametersSchema,
    /// Body branch.
    pub body: BodySchema,
}

impl ValidationSchema {
    /// Combine parameter and body branches.
    pub fn new(parameters: ParametersSchema, body: BodySchema) -> Self {
        Self { parameters, body }
    }

    /// The branch for `location`.
    pub fn location(&self, location: ParameterLocation) -> &LocationSchema {
        self.parameters.location(location)
    }

    /// Top-level request fields that must be present.
    pub fn required_fields(&self) -> Vec<&'static str> {
        let mut required = vec!["query", "headers", "path"];
        if self.body.required {
            required.push("body");
        }
        required
    }

    /// The single combined schema compiled by the engine. `components` is
    /// embedded so that `#/components/...` references resolve.
    pub fn to_engine_schema(&self, components: &Value) -> Value {
        json!({
            "required": self.required_fields(),
            "properties": {
                "query": self.parameters.query.to_engine_schema(),
                "headers": self.parameters.headers.to_engine_schema(),
                "path": self.parameters.path.to_engine_schema(),
                "cookies": self.parameters.cookies.to_engine_schema(),
                "body": self.body.schema,
            },
            "components": components,
        })
    }
}

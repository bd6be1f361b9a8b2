//! # Request Model
//!
//! [`OpenApiRequest`] is the request as handed over by a router that has
//! already matched the URL to a route template. [`NormalizedRequest`] is the
//! typed value produced by normalization; it is what the compiled schema sees
//! and what a successful validation returns.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::location::ParameterLocation;

/// A request matched to a route template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenApiRequest {
    /// HTTP method, any case.
    #[serde(alias = "httpMethod")]
    pub method: String,
    /// Route template, e.g. `/pets/{petId}`.
    pub route: String,
    /// Query values: strings, or arrays of strings for repeated keys.
    #[serde(default, alias = "queryStringParameters", skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,
    /// Header values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    /// Cookie values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Map<String, Value>>,
    /// Path parameter values extracted by the router.
    #[serde(default, alias = "pathParameters", skip_serializing_if = "Option::is_none")]
    pub path: Option<Map<String, Value>>,
    /// Parsed request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl OpenApiRequest {
    /// A request with no fields populated.
    pub fn new(method: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            route: route.into(),
            ..Self::default()
        }
    }

    /// Set the query map. Non-object values clear it.
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = into_map(query);
        self
    }

    /// Set the header map. Non-object values clear it.
    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = into_map(headers);
        self
    }

    /// Set the cookie map. Non-object values clear it.
    pub fn with_cookies(mut self, cookies: Value) -> Self {
        self.cookies = into_map(cookies);
        self
    }

    /// Set the path parameter map. Non-object values clear it.
    pub fn with_path(mut self, path: Value) -> Self {
        self.path = into_map(path);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

fn into_map(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// A request whose parameter fields have been decoded into typed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRequest {
    /// HTTP method as received.
    pub method: String,
    /// Route template.
    pub route: String,
    /// Decoded query values.
    pub query: Map<String, Value>,
    /// Headers with lower-cased names.
    pub headers: Map<String, Value>,
    /// Decoded path parameters.
    pub path: Map<String, Value>,
    /// Decoded cookies.
    pub cookies: Map<String, Value>,
    /// Request body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl NormalizedRequest {
    /// Copy a raw request, lower-casing header names and defaulting missing
    /// maps to empty ones.
    pub fn from_request(request: &OpenApiRequest) -> Self {
        let headers = request
            .headers
            .as_ref()
            .map(|h| {
                h.iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: request.method.clone(),
            route: request.route.clone(),
            query: request.query.clone().unwrap_or_default(),
            headers,
            path: request.path.clone().unwrap_or_default(),
            cookies: request.cookies.clone().unwrap_or_default(),
            body: request.body.clone(),
        }
    }

    /// The field holding values for `location`.
    pub fn field(&self, location: ParameterLocation) -> &Map<String, Value> {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.headers,
            ParameterLocation::Path => &self.path,
            ParameterLocation::Cookie => &self.cookies,
        }
    }

    /// Mutable access to the field holding values for `location`.
    pub fn field_mut(&mut self, location: ParameterLocation) -> &mut Map<String, Value> {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Path => &mut self.path,
            ParameterLocation::Cookie => &mut self.cookies,
        }
    }

    /// The JSON instance checked by the compiled request schema.
    pub fn to_instance(&self) -> Value {
        let mut instance = Map::new();
        instance.insert("query".into(), Value::Object(self.query.clone()));
        instance.insert("headers".into(), Value::Object(self.headers.clone()));
        instance.insert("path".into(), Value::Object(self.path.clone()));
        instance.insert("cookies".into(), Value::Object(self.cookies.clone()));
        if let Some(body) = &self.body {
            instance.insert("body".into(), body.clone());
        }
        Value::Object(instance)
    }

    /// Rebuild the typed fields from an instance produced by
    /// [`to_instance`](Self::to_instance).
    pub fn replace_from_instance(&mut self, instance: Value) {
        let Value::Object(mut fields) = instance else {
            return;
        };
        let mut take = |name: &str| match fields.remove(name) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        self.query = take("query");
        self.headers = take("headers");
        self.path = take("path");
        self.cookies = take("cookies");
        self.body = fields.remove("body");
    }
}

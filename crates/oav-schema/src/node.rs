//! # Schema Nodes
//!
//! A tagged view over JSON schema values. Every place that needs to know
//! "what kind of schema is this" (object detection for query styles, array
//! detection for delimiters, default synthesis, coercion targets) goes
//! through [`SchemaNode::of`] and [`SchemaResolver`] instead of probing keys
//! ad hoc.
//!
//! Classification precedence: `$ref`, then `allOf`, `oneOf`, `anyOf`, then
//! the primary `type` (first non-`null` entry of a type array). Untyped
//! schemas with `properties` count as objects, untyped schemas with `items`
//! as arrays.

use serde_json::{Map, Value};

use crate::document::{resolve_pointer, MAX_REF_DEPTH};

/// Tagged view of one schema value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchemaNode<'a> {
    /// A `$ref` to another schema.
    Ref(&'a str),
    /// `allOf` members.
    AllOf(&'a [Value]),
    /// `oneOf` members.
    OneOf(&'a [Value]),
    /// `anyOf` members.
    AnyOf(&'a [Value]),
    /// An array schema and its `items`.
    Array(Option<&'a Value>),
    /// An object schema and its `properties`.
    Object(Option<&'a Map<String, Value>>),
    /// Any other schema, with its primary type if declared.
    Scalar(Option<&'a str>),
}

impl<'a> SchemaNode<'a> {
    /// Classify `schema`.
    pub fn of(schema: &'a Value) -> Self {
        let Some(map) = schema.as_object() else {
            return Self::Scalar(None);
        };
        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            return Self::Ref(reference);
        }
        if let Some(members) = map.get("allOf").and_then(Value::as_array) {
            return Self::AllOf(members);
        }
        if let Some(members) = map.get("oneOf").and_then(Value::as_array) {
            return Self::OneOf(members);
        }
        if let Some(members) = map.get("anyOf").and_then(Value::as_array) {
            return Self::AnyOf(members);
        }
        match primary_type(schema) {
            Some("object") => Self::Object(map.get("properties").and_then(Value::as_object)),
            Some("array") => Self::Array(map.get("items")),
            None if map.contains_key("properties") => {
                Self::Object(map.get("properties").and_then(Value::as_object))
            }
            None if map.contains_key("items") => Self::Array(map.get("items")),
            other => Self::Scalar(other),
        }
    }

    /// Members of a composition node.
    pub fn members(&self) -> &'a [Value] {
        match self {
            Self::AllOf(m) | Self::OneOf(m) | Self::AnyOf(m) => *m,
            _ => &[],
        }
    }
}

/// The declared type of `schema`; for a type array, the first non-`null`
/// entry.
pub fn primary_type(schema: &Value) -> Option<&str> {
    match schema.get("type")? {
        Value::String(t) => Some(t.as_str()),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null"),
        _ => None,
    }
}

/// Resolves local references and answers structural questions about
/// schemas, relative to a root that holds `components`.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    root: &'a Value,
}

impl<'a> SchemaResolver<'a> {
    /// A resolver over `root`; `#/components/...` pointers are looked up in it.
    pub fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// Follow `$ref` chains until a non-reference schema is reached.
    /// Returns `None` for dangling references or overlong chains.
    pub fn resolve<'s>(&self, mut schema: &'s Value) -> Option<&'s Value>
    where
        'a: 's,
    {
        for _ in 0..MAX_REF_DEPTH {
            match SchemaNode::of(schema) {
                SchemaNode::Ref(reference) => schema = resolve_pointer(self.root, reference)?,
                _ => return Some(schema),
            }
        }
        None
    }

    /// Whether `schema` denotes an object, directly, through a reference, or
    /// through any composition member.
    pub fn is_object_like(&self, schema: &Value) -> bool {
        self.is_object_like_at(schema, 0)
    }

    fn is_object_like_at(&self, schema: &Value, depth: usize) -> bool {
        if depth > MAX_REF_DEPTH {
            return false;
        }
        let Some(schema) = self.resolve(schema) else {
            return false;
        };
        match SchemaNode::of(schema) {
            SchemaNode::Object(_) => true,
            node @ (SchemaNode::AllOf(_) | SchemaNode::OneOf(_) | SchemaNode::AnyOf(_)) => node
                .members()
                .iter()
                .any(|m| self.is_object_like_at(m, depth + 1)),
            _ => false,
        }
    }

    /// The effective primary type of `schema`, looking through references
    /// and taking the first typed `allOf` member.
    pub fn effective_type<'s>(&self, schema: &'s Value) -> Option<&'s str>
    where
        'a: 's,
    {
        self.effective_type_at(schema, 0)
    }

    fn effective_type_at<'s>(&self, schema: &'s Value, depth: usize) -> Option<&'s str>
    where
        'a: 's,
    {
        if depth > MAX_REF_DEPTH {
            return None;
        }
        let schema = self.resolve(schema)?;
        if let Some(t) = primary_type(schema) {
            return Some(t);
        }
        match SchemaNode::of(schema) {
            SchemaNode::AllOf(members) => members
                .iter()
                .find_map(|m| self.effective_type_at(m, depth + 1)),
            SchemaNode::Object(_) => Some("object"),
            SchemaNode::Array(_) => Some("array"),
            _ => None,
        }
    }

    /// Declared sub-properties of an object-like schema, including those of
    /// object members of `allOf`/`oneOf`/`anyOf`, in declaration order.
    pub fn properties<'s>(&self, schema: &'s Value) -> Vec<(&'s str, &'s Value)>
    where
        'a: 's,
    {
        let mut out = Vec::new();
        self.collect_properties(schema, 0, &mut out);
        out
    }

    fn collect_properties<'s>(
        &self,
        schema: &'s Value,
        depth: usize,
        out: &mut Vec<(&'s str, &'s Value)>,
    ) where
        'a: 's,
    {
        if depth > MAX_REF_DEPTH {
            return;
        }
        let Some(schema) = self.resolve(schema) else {
            return;
        };
        match SchemaNode::of(schema) {
            SchemaNode::Object(Some(props)) => {
                for (name, sub) in props {
                    if !out.iter().any(|(n, _)| *n == name.as_str()) {
                        out.push((name.as_str(), sub));
                    }
                }
            }
            node @ (SchemaNode::AllOf(_) | SchemaNode::OneOf(_) | SchemaNode::AnyOf(_)) => {
                for member in node.members() {
                    self.collect_properties(member, depth + 1, out);
                }
            }
            _ => {}
        }
    }

    /// The schema of property `name` of an object-like schema.
    pub fn property<'s>(&self, schema: &'s Value, name: &str) -> Option<&'s Value>
    where
        'a: 's,
    {
        self.properties(schema)
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, s)| s)
    }

    /// Synthesize a default value for `schema`.
    ///
    /// - an explicit `default` wins;
    /// - a referenced schema yields the target's default;
    /// - a composition yields the first member that has a default;
    /// - an object yields a map of its properties' defaults. At the top
    ///   level the map is returned even when empty; nested objects only
    ///   contribute when they produced at least one entry.
    pub fn default_value(&self, schema: &Value) -> Option<Value> {
        self.default_at(schema, 0)
    }

    fn default_at(&self, schema: &Value, depth: usize) -> Option<Value> {
        if depth > MAX_REF_DEPTH {
            return None;
        }
        if let Some(default) = schema.get("default") {
            return Some(default.clone());
        }
        match SchemaNode::of(schema) {
            SchemaNode::Ref(reference) => {
                let target = resolve_pointer(self.root, reference)?;
                self.default_at(target, depth + 1)
            }
            node @ (SchemaNode::AllOf(_) | SchemaNode::OneOf(_) | SchemaNode::AnyOf(_)) => node
                .members()
                .iter()
                .find_map(|m| self.default_at(m, depth + 1)),
            SchemaNode::Object(Some(props)) => {
                let mut map = Map::new();
                for (name, sub) in props {
                    let child = self.default_at(sub, depth + 1);
                    match child {
                        Some(Value::Object(nested)) if nested.is_empty() => {}
                        Some(value) => {
                            map.insert(name.clone(), value);
                        }
                        None => {}
                    }
                }
                if depth == 0 || !map.is_empty() {
                    Some(Value::Object(map))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn root() -> Value {
        json!({
            "components": {
                "schemas": {
                    "Color": { "type": "string", "default": "red" },
                    "Filter": {
                        "type": "object",
                        "properties": { "color": { "$ref": "#/components/schemas/Color" } }
                    },
                    "Alias": { "$ref": "#/components/schemas/Filter" },
                    "Loop": { "$ref": "#/components/schemas/Loop" }
                }
            }
        })
    }

    #[test]
    fn classification_precedence() {
        let schema = json!({ "$ref": "#/x", "type": "object" });
        assert!(matches!(SchemaNode::of(&schema), SchemaNode::Ref("#/x")));
        let schema = json!({ "allOf": [], "type": "object" });
        assert!(matches!(SchemaNode::of(&schema), SchemaNode::AllOf(_)));
        let schema = json!({ "type": ["null", "array"] });
        assert!(matches!(SchemaNode::of(&schema), SchemaNode::Array(None)));
        let schema = json!({ "properties": {} });
        assert!(matches!(SchemaNode::of(&schema), SchemaNode::Object(Some(_))));
        let schema = json!({ "type": "integer" });
        assert!(matches!(SchemaNode::of(&schema), SchemaNode::Scalar(Some("integer"))));
    }

    #[test]
    fn resolves_reference_chains() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let alias = json!({ "$ref": "#/components/schemas/Alias" });
        assert_eq!(resolver.resolve(&alias).unwrap()["type"], "object");
        assert!(resolver.is_object_like(&alias));
    }

    #[test]
    fn cyclic_reference_is_unresolved() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let cyclic = json!({ "$ref": "#/components/schemas/Loop" });
        assert!(resolver.resolve(&cyclic).is_none());
        assert!(!resolver.is_object_like(&cyclic));
    }

    #[test]
    fn object_like_through_composition() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "anyOf": [{ "type": "string" }, { "$ref": "#/components/schemas/Filter" }] });
        assert!(resolver.is_object_like(&schema));
        assert!(!resolver.is_object_like(&json!({ "type": "string" })));
    }

    #[test]
    fn effective_type_looks_through_all_of() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "allOf": [{ "description": "x" }, { "type": "array" }] });
        assert_eq!(resolver.effective_type(&schema), Some("array"));
    }

    #[test]
    fn properties_merge_composition_members() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({
            "allOf": [
                { "$ref": "#/components/schemas/Filter" },
                { "type": "object", "properties": { "size": { "type": "integer" } } }
            ]
        });
        let names: Vec<_> = resolver.properties(&schema).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["color", "size"]);
    }

    #[test]
    fn default_from_property_defaults() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "type": "object", "properties": { "color": { "default": "blue" } } });
        assert_eq!(resolver.default_value(&schema), Some(json!({ "color": "blue" })));
    }

    #[test]
    fn top_level_object_without_defaults_is_empty_map() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "type": "object", "properties": { "size": { "type": "string" } } });
        assert_eq!(resolver.default_value(&schema), Some(json!({})));
    }

    #[test]
    fn default_through_references() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "oneOf": [{ "$ref": "#/components/schemas/Filter" }] });
        assert_eq!(resolver.default_value(&schema), Some(json!({ "color": "red" })));
    }

    #[test]
    fn explicit_default_wins() {
        let root = root();
        let resolver = SchemaResolver::new(&root);
        let schema = json!({ "type": "object", "default": { "a": 1 }, "properties": { "a": { "default": 2 } } });
        assert_eq!(resolver.default_value(&schema), Some(json!({ "a": 1 })));
    }
}

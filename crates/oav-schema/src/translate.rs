//! # Error Translation
//!
//! Maps [`NativeError`]s to the public [`BadRequest`] payload. Wording is
//! fixed per keyword and does not depend on the engine's own messages, so
//! the payload is identical whichever engine version produced the failures.
//!
//! Item paths are dotted (`.path.petId`) with array indices as `[n]`.

use serde_json::Value;

use oav_core::{BadRequest, ValidationErrorItem};

use crate::engine::NativeError;

/// Build the rejection for `route` from engine failures, in engine order.
pub fn bad_request(route: &str, errors: &[NativeError]) -> BadRequest {
    let mut items = Vec::new();
    let mut summary = Vec::new();
    for error in errors {
        translate(error, &mut items, &mut summary);
    }
    BadRequest::new(route, &summary, items)
}

fn translate(error: &NativeError, items: &mut Vec<ValidationErrorItem>, summary: &mut Vec<String>) {
    let instance_path = dotted_path(&error.instance_path);
    let keyword = error.keyword.as_str();

    match keyword {
        "required" if error.missing_property.is_some() => {
            let property = error.missing_property.as_deref().unwrap_or_default();
            let path = format!("{instance_path}.{property}");
            let message = format!("must have required property '{property}'");
            summary.push(format!("request{instance_path} {message}"));
            items.push(item(
                path.clone(),
                message,
                format!("missing required property request{path}"),
                keyword,
            ));
        }
        "additionalProperties" if !error.unexpected_properties.is_empty() => {
            let message = "must NOT have additional properties";
            for property in &error.unexpected_properties {
                summary.push(format!("request{instance_path} {message}"));
                items.push(item(
                    format!("{instance_path}.{property}"),
                    message.to_string(),
                    format!("request{instance_path} must NOT have additional property: '{property}'"),
                    keyword,
                ));
            }
        }
        _ => {
            let message = message_for(error);
            summary.push(format!("request{instance_path} {message}"));
            items.push(item(
                instance_path.clone(),
                message.clone(),
                format!("request{instance_path} {message}"),
                keyword,
            ));
        }
    }
}

fn item(path: String, message: String, full_message: String, keyword: &str) -> ValidationErrorItem {
    ValidationErrorItem {
        path,
        message,
        full_message: Some(full_message),
        error_code: Some(format!("{keyword}.openapi.validation")),
    }
}

/// Convert a JSON pointer (`/query/tags/0`) into a dotted path
/// (`.query.tags[0]`).
pub fn dotted_path(pointer: &str) -> String {
    let mut out = String::new();
    for raw in pointer.split('/').skip(1) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            out.push('.');
            out.push_str(&segment);
        }
    }
    out
}

fn message_for(error: &NativeError) -> String {
    let value = error.keyword_value.as_ref();
    let n = || value.map(render_scalar).unwrap_or_default();
    match error.keyword.as_str() {
        "type" => format!("must be {}", render_types(value)),
        "enum" => format!(
            "must be equal to one of the allowed values: {}",
            value
                .and_then(Value::as_array)
                .map(|allowed| allowed.iter().map(render_scalar).collect::<Vec<_>>().join(", "))
                .unwrap_or_default()
        ),
        "minLength" => format!("must NOT have fewer than {} characters", n()),
        "maxLength" => format!("must NOT have more than {} characters", n()),
        "pattern" => format!("must match pattern \"{}\"", n()),
        "format" => format!("must match format \"{}\"", n()),
        "minimum" => format!("must be >= {}", n()),
        "maximum" => format!("must be <= {}", n()),
        "exclusiveMinimum" => format!("must be > {}", n()),
        "exclusiveMaximum" => format!("must be < {}", n()),
        "minItems" => format!("must NOT have fewer than {} items", n()),
        "maxItems" => format!("must NOT have more than {} items", n()),
        "uniqueItems" => "must NOT have duplicate items".to_string(),
        "minProperties" => format!("must NOT have fewer than {} properties", n()),
        "maxProperties" => format!("must NOT have more than {} properties", n()),
        "multipleOf" => format!("must be multiple of {}", n()),
        "oneOf" => "must match exactly one schema in oneOf".to_string(),
        "anyOf" => "must match a schema in anyOf".to_string(),
        "not" => "must NOT be valid".to_string(),
        "const" => "must be equal to constant".to_string(),
        "additionalProperties" => "must NOT have additional properties".to_string(),
        "required" => "must have required property".to_string(),
        _ => error.engine_message.clone(),
    }
}

fn render_types(value: Option<&Value>) -> String {
    let types: Vec<&str> = match value {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(list)) => list.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    let without_null: Vec<&str> = types.iter().copied().filter(|t| *t != "null").collect();
    if without_null.is_empty() {
        types.join(",")
    } else {
        without_null.join(",")
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn native(keyword: &str, instance_path: &str, keyword_value: Option<Value>) -> NativeError {
        NativeError {
            keyword: keyword.to_string(),
            instance_path: instance_path.to_string(),
            schema_path: String::new(),
            keyword_value,
            missing_property: None,
            unexpected_properties: Vec::new(),
            engine_message: "engine says no".to_string(),
        }
    }

    #[test]
    fn dotted_paths() {
        assert_eq!(dotted_path(""), "");
        assert_eq!(dotted_path("/path/petId"), ".path.petId");
        assert_eq!(dotted_path("/body/tags/0/name"), ".body.tags[0].name");
        assert_eq!(dotted_path("/headers/a~1b"), ".headers.a/b");
    }

    #[test]
    fn required_and_additional_properties() {
        let mut missing = native("required", "/path", Some(json!(["petId"])));
        missing.missing_property = Some("petId".into());
        let mut extra = native("additionalProperties", "/path", Some(json!(false)));
        extra.unexpected_properties = vec!["otherParameterNotPetId".into()];

        let bad = bad_request("/pets/{petId}", &[missing, extra]);
        assert_eq!(bad.status_code, 400);
        assert_eq!(bad.errors.len(), 2);

        assert_eq!(bad.errors[0].path, ".path.petId");
        assert_eq!(bad.errors[0].message, "must have required property 'petId'");
        assert_eq!(
            bad.errors[0].full_message.as_deref(),
            Some("missing required property request.path.petId")
        );
        assert_eq!(bad.errors[0].error_code.as_deref(), Some("required.openapi.validation"));

        assert_eq!(bad.errors[1].path, ".path.otherParameterNotPetId");
        assert_eq!(bad.errors[1].message, "must NOT have additional properties");
        assert_eq!(
            bad.errors[1].full_message.as_deref(),
            Some("request.path must NOT have additional property: 'otherParameterNotPetId'")
        );
        assert_eq!(
            bad.summary_message,
            "request.path must have required property 'petId', request.path must NOT have additional properties"
        );
    }

    #[test]
    fn type_message_drops_null() {
        let bad = bad_request("/r", &[native("type", "/query/limit", Some(json!(["integer", "null"])))]);
        assert_eq!(bad.errors[0].message, "must be integer");
        assert_eq!(bad.errors[0].full_message.as_deref(), Some("request.query.limit must be integer"));
        assert_eq!(bad.errors[0].error_code.as_deref(), Some("type.openapi.validation"));
    }

    #[test]
    fn enum_lists_allowed_values() {
        let bad = bad_request("/r", &[native("enum", "/query/kind", Some(json!(["dog", "cat"])))]);
        assert_eq!(bad.errors[0].message, "must be equal to one of the allowed values: dog, cat");
    }

    #[test]
    fn bounded_keywords() {
        let cases = [
            ("maxLength", json!(20), "must NOT have more than 20 characters"),
            ("minimum", json!(1), "must be >= 1"),
            ("exclusiveMaximum", json!(10), "must be < 10"),
            ("minItems", json!(2), "must NOT have fewer than 2 items"),
            ("pattern", json!("^[a-z]+$"), "must match pattern \"^[a-z]+$\""),
            ("format", json!("uuid"), "must match format \"uuid\""),
        ];
        for (keyword, value, expected) in cases {
            let bad = bad_request("/r", &[native(keyword, "/body", Some(value))]);
            assert_eq!(bad.errors[0].message, expected);
        }
    }

    #[test]
    fn unknown_keywords_fall_back_to_engine_message() {
        let bad = bad_request("/r", &[native("contains", "/body", None)]);
        assert_eq!(bad.errors[0].message, "engine says no");
    }
}

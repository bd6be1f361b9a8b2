//! # Operation Keys
//!
//! An [`OperationKey`] identifies exactly one compiled validator: the HTTP
//! method, the route template, and the content-type equivalence class,
//! lower-cased into a single string. [`OperationKey::new`] is the only
//! constructor, and both the live and the ahead-of-time paths go through it,
//! so a key computed while compiling an artifact always matches the key
//! computed for a live request.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::content_type::ContentType;

/// Cache key for one `(method, route, content class)` combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationKey(String);

impl OperationKey {
    /// Derive the key for a request or a declared media type.
    pub fn new(method: &str, route: &str, content_type: &ContentType) -> Self {
        Self::from_class(method, route, &content_type.key_class())
    }

    /// Derive the key from an already computed content class.
    pub fn from_class(method: &str, route: &str, content_class: &str) -> Self {
        Self(format!("{method}-{route}-{content_class}").to_lowercase())
    }

    /// The key string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_lower_cased() {
        let key = OperationKey::new("GET", "/Pets/{petId}", &ContentType::parse(None));
        assert_eq!(key.as_str(), "get-/pets/{petid}-not_provided");
    }

    #[test]
    fn charset_variants_share_a_key() {
        let a = OperationKey::new("post", "/pets", &ContentType::parse(Some("application/json")));
        let b = OperationKey::new(
            "POST",
            "/pets",
            &ContentType::parse(Some("application/json; charset=utf-8")),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn from_class_matches_new() {
        let ct = ContentType::parse(Some("text/plain"));
        assert_eq!(
            OperationKey::new("put", "/a", &ct),
            OperationKey::from_class("put", "/a", &ct.key_class())
        );
    }
}

//! # Content-Type Equivalence
//!
//! Parses an optional `Content-Type` header into the pieces used for cache-key
//! construction and request-body negotiation. Parsing is case-insensitive and
//! drops any `boundary` parameter, so two multipart requests with different
//! boundaries share one equivalence class.

use serde_json::{Map, Value};

/// Key class used when a request carries no `Content-Type` header.
pub const NOT_PROVIDED: &str = "not_provided";

/// A parsed `Content-Type` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentType {
    raw: Option<String>,
    media_type: Option<String>,
    charset: Option<String>,
    without_boundary: Option<String>,
}

impl ContentType {
    /// Parse an optional header value. Blank values are treated as absent.
    pub fn parse(header: Option<&str>) -> Self {
        let Some(raw) = header.map(str::trim).filter(|h| !h.is_empty()) else {
            return Self::default();
        };

        let lowered = raw.to_ascii_lowercase();
        let without_boundary = strip_boundary(&lowered).trim_end().to_string();

        let mut segments = without_boundary.split(';');
        let media_type = segments.next().unwrap_or_default().trim().to_string();
        let charset = segments
            .next()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            raw: Some(raw.to_string()),
            media_type: Some(media_type),
            charset,
            without_boundary: Some(without_boundary),
        }
    }

    /// Rebuild the content type a key class stands for. The sentinel
    /// [`NOT_PROVIDED`] maps back to an absent header.
    pub fn from_key_class(class: &str) -> Self {
        if class == NOT_PROVIDED {
            Self::default()
        } else {
            Self::parse(Some(class))
        }
    }

    /// Read the `content-type` header from a header map, matching the name
    /// case-insensitively.
    pub fn from_headers(headers: Option<&Map<String, Value>>) -> Self {
        let value = headers.and_then(|h| {
            h.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
                .and_then(|(_, v)| v.as_str())
        });
        Self::parse(value)
    }

    /// The header exactly as supplied (trimmed).
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The bare media type, e.g. `application/json`.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    /// The first parameter after the media type, e.g. `charset=utf-8`.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// The lower-cased header with any `boundary` parameter removed.
    pub fn without_boundary(&self) -> Option<&str> {
        self.without_boundary.as_deref()
    }

    /// Whether a header was supplied at all.
    pub fn is_provided(&self) -> bool {
        self.raw.is_some()
    }

    /// Whether the header is a `type/*` wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.raw.as_deref().is_some_and(is_type_wildcard)
    }

    /// Ordered candidate keys for cache-key construction and negotiation.
    ///
    /// With a charset the bare media type comes first; without one the
    /// normalized header comes first, followed by a `charset=utf-8` variant.
    pub fn equivalents(&self) -> Vec<String> {
        let (Some(media), Some(without_boundary)) = (&self.media_type, &self.without_boundary)
        else {
            return Vec::new();
        };
        match &self.charset {
            Some(charset) => vec![media.clone(), format!("{media}; {charset}")],
            None => vec![without_boundary.clone(), format!("{media}; charset=utf-8")],
        }
    }

    /// The equivalence class used in operation keys.
    pub fn key_class(&self) -> String {
        self.equivalents()
            .into_iter()
            .next()
            .unwrap_or_else(|| NOT_PROVIDED.to_string())
    }
}

/// Whether `value` has the shape `type/*` with an alphabetic type.
pub fn is_type_wildcard(value: &str) -> bool {
    match value.split_once('/') {
        Some((kind, "*")) => !kind.is_empty() && kind.bytes().all(|b| b.is_ascii_lowercase()),
        _ => false,
    }
}

fn strip_boundary(header: &str) -> &str {
    let mut search_from = 0;
    while let Some(offset) = header[search_from..].find(';') {
        let semicolon = search_from + offset;
        if header[semicolon + 1..].trim_start().starts_with("boundary") {
            return &header[..semicolon];
        }
        search_from = semicolon + 1;
    }
    header
}

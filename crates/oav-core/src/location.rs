//! Parameter locations and the request fields they map to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where a parameter lives in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
}

impl ParameterLocation {
    /// All locations, in request-schema order.
    pub const ALL: [ParameterLocation; 4] = [Self::Query, Self::Header, Self::Path, Self::Cookie];

    /// The OpenAPI `in` value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Path => "path",
            Self::Cookie => "cookie",
        }
    }

    /// The request field holding values for this location.
    pub fn request_field(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "headers",
            Self::Path => "path",
            Self::Cookie => "cookies",
        }
    }

    /// OpenAPI default `style` for this location.
    pub fn default_style(&self) -> &'static str {
        match self {
            Self::Query | Self::Cookie => "form",
            Self::Header | Self::Path => "simple",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterLocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(Self::Query),
            "header" => Ok(Self::Header),
            "path" => Ok(Self::Path),
            "cookie" => Ok(Self::Cookie),
            other => Err(other.to_string()),
        }
    }
}

//! # Error Types: Public Error Taxonomy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`.
//!
//! ## Design
//!
//! - Configuration and artifact errors are fatal at construction/load.
//! - Structural specification errors are fatal the first time the offending
//!   operation is exercised.
//! - [`BadRequest`] is the only error expected in steady-state traffic. It
//!   carries itemized failures and always maps to HTTP 400.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP status carried by every [`BadRequest`].
pub const BAD_REQUEST_STATUS: u16 = 400;

/// One itemized request failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationErrorItem {
    /// Dotted location inside the request, e.g. `.path.petId`.
    pub path: String,
    /// Short description, e.g. `must have required property 'petId'`.
    pub message: String,
    /// Self-contained description including the request location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_message: Option<String>,
    /// Machine-readable code, e.g. `required.openapi.validation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ValidationErrorItem {
    /// An item with only a path and message.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            full_message: None,
            error_code: None,
        }
    }
}

impl fmt::Display for ValidationErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.full_message {
            Some(full) => f.write_str(full),
            None => write!(f, "{}: {}", self.path, self.message),
        }
    }
}

/// A rejected request.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("Bad Request: {summary_message}")]
pub struct BadRequest {
    /// Always 400.
    pub status_code: u16,
    /// Itemized messages joined with `", "`.
    pub summary_message: String,
    /// The route template the request was matched to.
    pub route: String,
    /// Individual failures.
    pub errors: Vec<ValidationErrorItem>,
}

impl BadRequest {
    /// Build a rejection whose summary joins `summary_parts` with `", "`.
    pub fn new(
        route: impl Into<String>,
        summary_parts: &[String],
        errors: Vec<ValidationErrorItem>,
    ) -> Self {
        Self {
            status_code: BAD_REQUEST_STATUS,
            summary_message: summary_parts.join(", "),
            route: route.into(),
            errors,
        }
    }

    /// A rejection whose summary is the concatenation of the item messages.
    pub fn from_items(route: impl Into<String>, errors: Vec<ValidationErrorItem>) -> Self {
        let parts: Vec<String> = errors.iter().map(|e| e.message.clone()).collect();
        Self::new(route, &parts, errors)
    }
}

/// Top-level error type for request validation.
#[derive(Error, Debug)]
pub enum RequestValidationError {
    /// Missing or unusable specification, options, or input files.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A parameter or body declaration that cannot be turned into a schema.
    #[error("invalid declaration for route {route}: {message}")]
    StructuralSpec {
        /// Route template of the operation being assembled.
        route: String,
        /// Description naming the offending parameter or schema.
        message: String,
    },

    /// The request does not conform to the operation.
    #[error(transparent)]
    BadRequest(#[from] BadRequest),

    /// A compiled artifact that is missing, corrupt, or incompatible.
    #[error("artifact error for '{path}': {reason}")]
    Artifact {
        /// Path of the artifact.
        path: String,
        /// Reason the artifact could not be used.
        reason: String,
    },

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestValidationError {
    /// Shorthand for [`RequestValidationError::StructuralSpec`].
    pub fn structural(route: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StructuralSpec {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Shorthand for [`RequestValidationError::Artifact`].
    pub fn artifact(path: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Artifact {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// HTTP status to report: 400 for rejected requests, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(bad) => bad.status_code,
            _ => 500,
        }
    }

    /// The rejection, if this error is one.
    pub fn as_bad_request(&self) -> Option<&BadRequest> {
        match self {
            Self::BadRequest(bad) => Some(bad),
            _ => None,
        }
    }
}

//! # Schema Fingerprints
//!
//! Content-addressed identifiers for assembled request schemas. Two schemas
//! with the same fingerprint compile to one predicate, which is how
//! equivalent content-type variants (including "no body") alias a single
//! compiled function. The same digest protects the compiled artifact payload.
//!
//! Fingerprints are SHA-256 over RFC 8785 (JCS) canonical JSON, so key order
//! and whitespace never influence the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Failure to canonicalize a value before hashing.
#[derive(Error, Debug)]
#[error("canonical serialization failed: {0}")]
pub struct CanonicalizationError(#[from] serde_json::Error);

/// A lowercase hex SHA-256 digest of canonical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical bytes for any serializable value.
pub fn canonical_bytes(value: &impl Serialize) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(serde_jcs::to_vec(value)?)
}

/// Compute the fingerprint of any serializable value.
pub fn fingerprint(value: &impl Serialize) -> Result<SchemaFingerprint, CanonicalizationError> {
    let bytes = canonical_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(SchemaFingerprint(
        digest.iter().map(|b| format!("{b:02x}")).collect(),
    ))
}

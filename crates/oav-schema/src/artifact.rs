//! # Compiled Artifacts
//!
//! Ahead-of-time compilation of every operation into one self-contained JSON
//! document, and the loader that turns it back into a [`RequestValidator`].
//!
//! ## Format
//!
//! ```text
//! {
//!   "formatVersion": 1,
//!   "engine": "jsonschema-0.28/draft7",
//!   "compiledAt": "...",
//!   "options": { ...schema-shaping options... },
//!   "payload": {
//!     "components": { ... },
//!     "operations": [ { method, route, mediaTypes, parameters, variants } ],
//!     "schemas": { "<fingerprint>": ValidationSchema },
//!     "keys": { "<operation key>": "<fingerprint>" }
//!   },
//!   "digest": "<sha256 of the canonical payload>"
//! }
//! ```
//!
//! Compiled predicates cannot be serialized, so the artifact stores the
//! assembled schemas and the loader recompiles each distinct one eagerly.
//! Schemas are deduplicated by fingerprint; `variants` maps each selected
//! media type (`""` for an operation without a body) to its fingerprint so
//! that keys never seen at compile time still resolve after loading.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use oav_core::{
    fingerprint, ContentType, OperationKey, OptionsStamp, RequestValidationError,
    SchemaFingerprint, ValidatorOptions,
};

use crate::document::ApiDocument;
use crate::engine::{SchemaEngine, ENGINE_STAMP};
use crate::node::SchemaResolver;
use crate::parameters::ParameterDescriptor;
use crate::plan::OperationPlan;
use crate::request_validator::{schema_fingerprint, RequestValidator};
use crate::validation_schema::ValidationSchema;

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// The on-disk artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub format_version: u32,
    pub engine: String,
    pub compiled_at: DateTime<Utc>,
    pub options: OptionsStamp,
    pub payload: ArtifactPayload,
    pub digest: String,
}

/// The digest-protected part of an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactPayload {
    pub components: Value,
    pub operations: Vec<OperationRecord>,
    pub schemas: BTreeMap<SchemaFingerprint, ValidationSchema>,
    pub keys: BTreeMap<OperationKey, SchemaFingerprint>,
}

/// One operation as recorded at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub method: String,
    pub route: String,
    pub media_types: Vec<String>,
    pub parameters: Vec<ParameterDescriptor>,
    /// Selected media type (`""` without a body) to schema fingerprint.
    pub variants: BTreeMap<String, SchemaFingerprint>,
}

/// What [`compile`] wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub operations: usize,
    pub keys: usize,
    pub schemas: usize,
    pub digest: String,
}

/// An artifact that passed every load-time check.
#[derive(Debug)]
pub struct LoadedArtifact {
    path: PathBuf,
    artifact: CompiledArtifact,
}

impl LoadedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn artifact(&self) -> &CompiledArtifact {
        &self.artifact
    }

    pub fn components(&self) -> &Value {
        &self.artifact.payload.components
    }

    /// The record for `method` (any case) and `route`.
    pub fn operation(&self, method: &str, route: &str) -> Option<&OperationRecord> {
        self.artifact
            .payload
            .operations
            .iter()
            .find(|op| op.method.eq_ignore_ascii_case(method) && op.route == route)
    }

    /// The fingerprint enumerated for `key` at compile time.
    pub fn fingerprint_for(&self, key: &OperationKey) -> Option<&SchemaFingerprint> {
        self.artifact.payload.keys.get(key)
    }

    pub fn schema(&self, fp: &SchemaFingerprint) -> Option<&ValidationSchema> {
        self.artifact.payload.schemas.get(fp)
    }
}

/// Compile every operation of `document` and write the artifact to `path`.
///
/// # Errors
///
/// Returns [`RequestValidationError::StructuralSpec`] for declarations that
/// cannot be assembled or compiled, and [`RequestValidationError::Io`] when
/// the artifact cannot be written.
pub async fn compile(
    document: &ApiDocument,
    options: &ValidatorOptions,
    path: &Path,
) -> Result<ArtifactSummary, RequestValidationError> {
    let engine = SchemaEngine::new(options);
    let components = document.components();
    let root = json!({ "components": components });
    let resolver = SchemaResolver::new(&root);

    let mut operations = Vec::new();
    let mut schemas: BTreeMap<SchemaFingerprint, ValidationSchema> = BTreeMap::new();
    let mut keys = BTreeMap::new();

    for op in document.operations() {
        let plan = OperationPlan::assemble(
            document,
            &op,
            resolver,
            options.allow_unknown_query_parameters,
        )?;
        let mut variants = BTreeMap::new();
        for class in plan.content_classes() {
            let (schema, selected) = plan.schema_for(resolver, &ContentType::from_key_class(&class));
            let fp = schema_fingerprint(&plan.route, &schema)?;
            if !schemas.contains_key(&fp) {
                engine
                    .compile(schema.to_engine_schema(&components))
                    .map_err(|e| RequestValidationError::structural(&plan.route, e.to_string()))?;
                schemas.insert(fp.clone(), schema);
            }
            variants.insert(selected.unwrap_or_default(), fp.clone());
            keys.insert(OperationKey::from_class(&plan.method, &plan.route, &class), fp);
        }
        tracing::debug!(method = %plan.method, route = %plan.route, variants = variants.len(), "compiled operation");
        operations.push(OperationRecord {
            method: plan.method,
            route: plan.route,
            media_types: plan.media_types,
            parameters: plan.descriptors,
            variants,
        });
    }

    let payload = ArtifactPayload {
        components,
        operations,
        schemas,
        keys,
    };
    let digest = payload_digest(&payload, path)?;
    let summary = ArtifactSummary {
        path: path.to_path_buf(),
        operations: payload.operations.len(),
        keys: payload.keys.len(),
        schemas: payload.schemas.len(),
        digest: digest.clone(),
    };
    let artifact = CompiledArtifact {
        format_version: FORMAT_VERSION,
        engine: ENGINE_STAMP.to_string(),
        compiled_at: Utc::now(),
        options: options.stamp(),
        payload,
        digest,
    };

    write_atomically(path, &artifact).await?;
    tracing::info!(
        path = %path.display(),
        operations = summary.operations,
        keys = summary.keys,
        schemas = summary.schemas,
        "wrote compiled artifact"
    );
    Ok(summary)
}

/// Read, verify, and eagerly recompile an artifact.
///
/// # Errors
///
/// Returns [`RequestValidationError::Artifact`] if the file is missing or
/// corrupt, has a different format version or engine stamp, fails its
/// digest, was compiled with an incompatible query policy, references custom
/// formats that `options` does not supply, or contains a schema that no
/// longer compiles.
pub async fn load(
    path: &Path,
    options: ValidatorOptions,
) -> Result<RequestValidator, RequestValidationError> {
    let artifact = read(path).await?;
    verify_options(&artifact, &options, path)?;

    let engine = SchemaEngine::new(&options);
    let mut compiled = HashMap::new();
    for (fp, schema) in &artifact.payload.schemas {
        let predicate = engine
            .compile(schema.to_engine_schema(&artifact.payload.components))
            .map_err(|e| {
                RequestValidationError::artifact(path.display(), format!("schema {fp}: {e}"))
            })?;
        compiled.insert(fp.clone(), Arc::new(predicate));
    }

    tracing::info!(
        path = %path.display(),
        operations = artifact.payload.operations.len(),
        schemas = compiled.len(),
        compiled_at = %artifact.compiled_at,
        "loaded compiled artifact"
    );
    let loaded = LoadedArtifact {
        path: path.to_path_buf(),
        artifact,
    };
    Ok(RequestValidator::from_artifact(loaded, compiled, engine, options))
}

/// Read an artifact and check its format version, engine stamp, and digest.
///
/// # Errors
///
/// Returns [`RequestValidationError::Artifact`] if the file is missing,
/// corrupt, or was written by an incompatible build.
pub async fn read(path: &Path) -> Result<CompiledArtifact, RequestValidationError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| RequestValidationError::artifact(path.display(), format!("cannot read: {e}")))?;
    let artifact: CompiledArtifact = serde_json::from_slice(&bytes)
        .map_err(|e| RequestValidationError::artifact(path.display(), format!("cannot parse: {e}")))?;
    verify_integrity(&artifact, path)?;
    Ok(artifact)
}

fn verify_integrity(artifact: &CompiledArtifact, path: &Path) -> Result<(), RequestValidationError> {
    if artifact.format_version != FORMAT_VERSION {
        return Err(RequestValidationError::artifact(
            path.display(),
            format!(
                "format version {} is not supported, expected {FORMAT_VERSION}",
                artifact.format_version
            ),
        ));
    }
    if artifact.engine != ENGINE_STAMP {
        return Err(RequestValidationError::artifact(
            path.display(),
            format!(
                "compiled for engine '{}', this build uses '{ENGINE_STAMP}'",
                artifact.engine
            ),
        ));
    }
    let digest = payload_digest(&artifact.payload, path)?;
    if digest != artifact.digest {
        return Err(RequestValidationError::artifact(
            path.display(),
            "integrity digest mismatch",
        ));
    }
    Ok(())
}

fn verify_options(
    artifact: &CompiledArtifact,
    options: &ValidatorOptions,
    path: &Path,
) -> Result<(), RequestValidationError> {
    let current = options.stamp();
    let stamped = &artifact.options;
    if stamped.allow_unknown_query_parameters != current.allow_unknown_query_parameters {
        return Err(RequestValidationError::artifact(
            path.display(),
            format!(
                "compiled with allowUnknownQueryParameters={}, options say {}",
                stamped.allow_unknown_query_parameters, current.allow_unknown_query_parameters
            ),
        ));
    }
    let missing: Vec<&str> = stamped
        .formats
        .difference(&current.formats)
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(RequestValidationError::artifact(
            path.display(),
            format!("custom formats not supplied: {}", missing.join(", ")),
        ));
    }
    if stamped.remove_additional != current.remove_additional {
        tracing::warn!(
            compiled = ?stamped.remove_additional,
            current = ?current.remove_additional,
            "removeAdditional differs from the artifact; using current options"
        );
    }
    if stamped.validate_formats != current.validate_formats {
        tracing::warn!(
            compiled = stamped.validate_formats,
            current = current.validate_formats,
            "validateFormats differs from the artifact; using current options"
        );
    }
    Ok(())
}

fn payload_digest(payload: &ArtifactPayload, path: &Path) -> Result<String, RequestValidationError> {
    fingerprint(payload)
        .map(|fp| fp.as_str().to_string())
        .map_err(|e| RequestValidationError::artifact(path.display(), e.to_string()))
}

/// Stage the artifact in a uniquely named file next to `path`, then rename it
/// into place. Concurrent writers never share a staging file.
async fn write_atomically(
    path: &Path,
    artifact: &CompiledArtifact,
) -> Result<(), RequestValidationError> {
    let bytes = serde_json::to_vec_pretty(artifact)
        .map_err(|e| RequestValidationError::artifact(path.display(), e.to_string()))?;
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            tokio::fs::create_dir_all(parent).await?;
            parent.to_path_buf()
        }
        None => PathBuf::from("."),
    };
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut staging = tempfile::NamedTempFile::new_in(&parent)?;
        staging.write_all(&bytes)?;
        staging.as_file().sync_all()?;
        staging.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| RequestValidationError::artifact(path.display(), e.to_string()))??;
    Ok(())
}

//! # oav-schema: OpenAPI Request Validation Engine
//!
//! Builds, caches, and runs request validators for the operations of an
//! OpenAPI 3 document.
//!
//! ## Entry Points
//!
//! - [`create_validator`]: assemble validators lazily from a live document.
//! - [`compile_validator`]: compile every operation into an artifact.
//! - [`load_validator`]: load an artifact into a validator with the same
//!   `validate` contract.
//!
//! ## Pipeline
//!
//! For each request: derive the [`OperationKey`](oav_core::OperationKey),
//! compile (or fetch) the operation's validator, normalize parameters per
//! their OpenAPI style ([`mutator`]), coerce and fill defaults ([`coerce`]),
//! reject unknown or empty query parameters, prune per `removeAdditional`
//! ([`prune`]), run the compiled schema ([`engine`]) and translate failures
//! ([`translate`]).

pub mod artifact;
pub mod body;
pub mod coerce;
pub mod document;
pub mod engine;
pub mod mutator;
pub mod node;
pub mod normalize;
pub mod parameters;
pub mod plan;
pub mod prune;
pub mod request_validator;
pub mod translate;
pub mod validation_schema;
pub mod validator;

use std::path::Path;

use oav_core::{RequestValidationError, ValidatorOptions};

pub use artifact::{ArtifactSummary, CompiledArtifact, FORMAT_VERSION};
pub use document::{ApiDocument, ApiSpecSource};
pub use engine::{SchemaEngine, ENGINE_STAMP};
pub use parameters::ParameterDescriptor;
pub use request_validator::{CompileState, RequestValidator};
pub use validation_schema::ValidationSchema;
pub use validator::{Validator, ValidatorOrigin};

/// Load `source` and return a validator that compiles each operation on
/// first use.
///
/// # Errors
///
/// Returns [`RequestValidationError::Configuration`] if the document cannot
/// be loaded.
pub async fn create_validator(
    source: impl Into<ApiSpecSource>,
    options: ValidatorOptions,
) -> Result<RequestValidator, RequestValidationError> {
    let document = ApiDocument::load(source.into()).await?;
    Ok(RequestValidator::from_document(document, options))
}

/// Compile every operation of `source` into an artifact at `artifact_path`.
///
/// # Errors
///
/// Returns [`RequestValidationError::Configuration`] if the document cannot
/// be loaded, [`RequestValidationError::StructuralSpec`] if an operation
/// cannot be compiled, and [`RequestValidationError::Io`] on write failure.
pub async fn compile_validator(
    source: impl Into<ApiSpecSource>,
    options: ValidatorOptions,
    artifact_path: impl AsRef<Path>,
) -> Result<ArtifactSummary, RequestValidationError> {
    let document = ApiDocument::load(source.into()).await?;
    artifact::compile(&document, &options, artifact_path.as_ref()).await
}

/// Read an artifact for inspection, checking its format version, engine
/// stamp, and digest but not its options.
///
/// # Errors
///
/// Returns [`RequestValidationError::Artifact`] if the artifact is missing,
/// corrupt, or written by an incompatible build.
pub async fn read_artifact(
    artifact_path: impl AsRef<Path>,
) -> Result<CompiledArtifact, RequestValidationError> {
    artifact::read(artifact_path.as_ref()).await
}

/// Load an artifact written by [`compile_validator`].
///
/// # Errors
///
/// Returns [`RequestValidationError::Artifact`] if the artifact is missing,
/// corrupt, or incompatible with this build or with `options`.
pub async fn load_validator(
    artifact_path: impl AsRef<Path>,
    options: ValidatorOptions,
) -> Result<RequestValidator, RequestValidationError> {
    artifact::load(artifact_path.as_ref(), options).await
}

//! # oav-core: Foundational Types for the OpenAPI Request Validator
//!
//! This crate defines the vocabulary shared by the validation engine
//! (`oav-schema`) and the command-line tool (`oav-cli`). It depends on no
//! other `oav-*` crate.
//!
//! ## Key Types
//!
//! - [`OpenApiRequest`] / [`NormalizedRequest`]: the request as handed over
//!   by a router, and the typed result of normalization.
//! - [`ContentType`]: Content-Type parsing into comparable equivalence keys.
//! - [`OperationKey`]: the single cache key derivation shared by the live and
//!   ahead-of-time paths.
//! - [`ValidatorOptions`]: the configuration value.
//! - [`RequestValidationError`] / [`BadRequest`]: the public error taxonomy.
//! - [`SchemaFingerprint`]: RFC 8785 canonical SHA-256 digests of schemas.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `oav-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod content_type;
pub mod digest;
pub mod error;
pub mod key;
pub mod location;
pub mod options;
pub mod request;

pub use content_type::ContentType;
pub use digest::{fingerprint, SchemaFingerprint};
pub use error::{BadRequest, RequestValidationError, ValidationErrorItem};
pub use key::OperationKey;
pub use location::ParameterLocation;
pub use options::{
    CustomFormat, FormatType, OptionsStamp, RemoveAdditional, SerDes, ValidatorOptions,
};
pub use request::{NormalizedRequest, OpenApiRequest};

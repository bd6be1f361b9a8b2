//! # oav-cli: OpenAPI Request Validator CLI
//!
//! Provides the `oav` command-line interface over `oav-schema`.
//!
//! ## Subcommands
//!
//! - `oav compile`: compile every operation of a document into an artifact.
//! - `oav check`: validate one request against a document or an artifact.
//! - `oav inspect`: summarize an artifact.
//!
//! ```bash
//! oav compile --spec petstore.yaml --out petstore.oav.json
//! oav check --artifact petstore.oav.json --request request.json
//! oav check --spec petstore.yaml --request '{"method":"get","route":"/pets"}'
//! oav inspect --artifact petstore.oav.json
//! ```
//!
//! ## Exit Codes
//!
//! `0` valid (or success), `1` request rejected, `2` operational error.

pub mod check;
pub mod compile;
pub mod inspect;

use std::path::Path;

use anyhow::{Context, Result};

use oav_core::ValidatorOptions;

/// The request was valid, or the command succeeded.
pub const EXIT_OK: u8 = 0;
/// The request was rejected.
pub const EXIT_REJECTED: u8 = 1;
/// The command could not run.
pub const EXIT_ERROR: u8 = 2;

/// Options from `--config`, or the defaults.
pub fn load_options(config: Option<&Path>) -> Result<ValidatorOptions> {
    match config {
        Some(path) => ValidatorOptions::from_file(path)
            .with_context(|| format!("failed to load options from {}", path.display())),
        None => Ok(ValidatorOptions::default()),
    }
}

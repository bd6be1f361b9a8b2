//! # Inspect CLI
//!
//! `oav inspect --artifact <file>` checks an artifact's integrity and prints
//! what it contains.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use oav_core::OptionsStamp;
use oav_schema::{read_artifact, CompiledArtifact};

use crate::EXIT_OK;

/// Inspect subcommand arguments.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Compiled artifact to inspect.
    #[arg(long)]
    pub artifact: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Summary of a compiled artifact.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectReport {
    pub format_version: u32,
    pub engine: String,
    pub compiled_at: String,
    pub digest: String,
    pub options: OptionsStamp,
    pub operations: Vec<OperationLine>,
    pub keys: usize,
    pub schemas: usize,
}

/// One operation in an [`InspectReport`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLine {
    pub method: String,
    pub route: String,
    pub media_types: Vec<String>,
    pub parameters: usize,
    pub variants: usize,
}

impl InspectReport {
    pub fn from_artifact(artifact: &CompiledArtifact) -> Self {
        let operations = artifact
            .payload
            .operations
            .iter()
            .map(|op| OperationLine {
                method: op.method.to_ascii_uppercase(),
                route: op.route.clone(),
                media_types: op.media_types.clone(),
                parameters: op.parameters.len(),
                variants: op.variants.len(),
            })
            .collect();
        Self {
            format_version: artifact.format_version,
            engine: artifact.engine.clone(),
            compiled_at: artifact.compiled_at.to_rfc3339(),
            digest: artifact.digest.clone(),
            options: artifact.options.clone(),
            operations,
            keys: artifact.payload.keys.len(),
            schemas: artifact.payload.schemas.len(),
        }
    }
}

/// Execute the inspect subcommand.
pub async fn run_inspect(args: &InspectArgs) -> Result<u8> {
    let artifact = read_artifact(&args.artifact)
        .await
        .with_context(|| format!("failed to read artifact {}", args.artifact.display()))?;
    let report = InspectReport::from_artifact(&artifact);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(EXIT_OK);
    }

    println!("  format:      v{}", report.format_version);
    println!("  engine:      {}", report.engine);
    println!("  compiled at: {}", report.compiled_at);
    println!("  digest:      {}", report.digest);
    println!(
        "  options:     allowUnknownQueryParameters={} removeAdditional={:?} validateFormats={}",
        report.options.allow_unknown_query_parameters,
        report.options.remove_additional,
        report.options.validate_formats
    );
    if !report.options.formats.is_empty() {
        let formats: Vec<&str> = report.options.formats.iter().map(String::as_str).collect();
        println!("  formats:     {}", formats.join(", "));
    }
    println!();
    for op in &report.operations {
        let media = if op.media_types.is_empty() {
            "-".to_string()
        } else {
            op.media_types.join(", ")
        };
        println!(
            "  {:<7} {} (parameters: {}, body: {media})",
            op.method, op.route, op.parameters
        );
    }
    println!();
    println!(
        "Total: {} operations, {} keys, {} schemas",
        report.operations.len(),
        report.keys,
        report.schemas
    );
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oav_core::ValidatorOptions;
    use oav_schema::compile_validator;
    use serde_json::json;

    #[tokio::test]
    async fn report_lists_operations() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.oav.json");
        let document = json!({
            "openapi": "3.0.3",
            "paths": {
                "/items": {
                    "get": {},
                    "post": {
                        "requestBody": {
                            "content": { "application/json": { "schema": { "type": "object" } } }
                        }
                    }
                }
            }
        });
        compile_validator(document, ValidatorOptions::default(), &path)
            .await
            .unwrap();

        let artifact = read_artifact(&path).await.unwrap();
        let report = InspectReport::from_artifact(&artifact);
        assert_eq!(report.operations.len(), 2);
        assert!(report.operations.iter().any(|op| op.method == "POST"
            && op.media_types == vec!["application/json".to_string()]));
        assert_eq!(report.digest, artifact.digest);

        let args = InspectArgs {
            artifact: path,
            json: true,
        };
        assert_eq!(run_inspect(&args).await.unwrap(), EXIT_OK);
    }

    #[tokio::test]
    async fn corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api.oav.json");
        std::fs::write(&path, "not json").unwrap();
        let args = InspectArgs {
            artifact: path,
            json: false,
        };
        assert!(run_inspect(&args).await.is_err());
    }
}

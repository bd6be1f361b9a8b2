//! # Check CLI
//!
//! `oav check (--spec <file> | --artifact <file>) --request <json>` validates
//! one request and prints either the normalized request or the rejection.
//!
//! `--request` takes a path to a JSON file or an inline JSON object. The
//! request shape is `{method, route, query?, headers?, cookies?, path?,
//! body?}`; gateway names (`httpMethod`, `pathParameters`,
//! `queryStringParameters`) are accepted too.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args};

use oav_core::{OpenApiRequest, RequestValidationError, ValidatorOptions};
use oav_schema::{create_validator, load_validator, RequestValidator};

use crate::{EXIT_OK, EXIT_REJECTED};

/// Check subcommand arguments.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["spec", "artifact"])))]
pub struct CheckArgs {
    /// OpenAPI document to validate against.
    #[arg(long)]
    pub spec: Option<PathBuf>,

    /// Compiled artifact to validate against.
    #[arg(long)]
    pub artifact: Option<PathBuf>,

    /// Request as a JSON file path or inline JSON.
    #[arg(long)]
    pub request: String,
}

/// Execute the check subcommand.
pub async fn run_check(args: &CheckArgs, options: ValidatorOptions) -> Result<u8> {
    let request = parse_request(&args.request)?;
    let validator = open_validator(args, options).await?;

    tracing::info!(method = %request.method, route = %request.route, "checking request");
    match validator.validate(request).await {
        Ok(normalized) => {
            println!("{}", serde_json::to_string_pretty(&normalized)?);
            Ok(EXIT_OK)
        }
        Err(RequestValidationError::BadRequest(rejection)) => {
            println!("{}", serde_json::to_string_pretty(&rejection)?);
            Ok(EXIT_REJECTED)
        }
        Err(e) => Err(e).context("request could not be validated"),
    }
}

async fn open_validator(args: &CheckArgs, options: ValidatorOptions) -> Result<RequestValidator> {
    match (&args.spec, &args.artifact) {
        (_, Some(artifact)) => load_validator(artifact, options)
            .await
            .with_context(|| format!("failed to load artifact {}", artifact.display())),
        (Some(spec), None) => create_validator(spec.as_path(), options)
            .await
            .with_context(|| format!("failed to load document {}", spec.display())),
        (None, None) => anyhow::bail!("one of --spec or --artifact is required"),
    }
}

/// Parse `--request`: inline JSON when it starts with `{`, otherwise a path.
pub fn parse_request(raw: &str) -> Result<OpenApiRequest> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).context("invalid inline request JSON");
    }
    let content = std::fs::read_to_string(raw)
        .with_context(|| format!("failed to read request file: {raw}"))?;
    serde_json::from_str(&content).with_context(|| format!("invalid request JSON in {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"
openapi: 3.0.3
info: { title: t, version: "1" }
paths:
  /items/{id}:
    get:
      parameters:
        - { name: id, in: path, required: true, schema: { type: integer } }
"#;

    fn spec_args(dir: &tempfile::TempDir, request: &str) -> CheckArgs {
        let spec = dir.path().join("api.yaml");
        std::fs::write(&spec, SPEC).unwrap();
        CheckArgs {
            spec: Some(spec),
            artifact: None,
            request: request.to_string(),
        }
    }

    #[test]
    fn parses_inline_request() {
        let request = parse_request(r#" {"method":"GET","route":"/items/{id}"}"#).unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.route, "/items/{id}");
    }

    #[test]
    fn parses_request_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(&path, r#"{"httpMethod":"get","route":"/x","pathParameters":{"id":"1"}}"#)
            .unwrap();
        let request = parse_request(path.to_str().unwrap()).unwrap();
        assert_eq!(request.method, "get");
        assert_eq!(request.path.unwrap()["id"], "1");
    }

    #[test]
    fn unreadable_request_is_an_error() {
        assert!(parse_request("/nonexistent/request.json").is_err());
        assert!(parse_request("{ not json").is_err());
    }

    #[tokio::test]
    async fn valid_request_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        let args = spec_args(&dir, r#"{"method":"get","route":"/items/{id}","path":{"id":"5"}}"#);
        let code = run_check(&args, ValidatorOptions::default()).await.unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[tokio::test]
    async fn rejected_request_exits_one() {
        let dir = tempfile::tempdir().unwrap();
        let args = spec_args(&dir, r#"{"method":"get","route":"/items/{id}","path":{"id":"x"}}"#);
        let code = run_check(&args, ValidatorOptions::default()).await.unwrap();
        assert_eq!(code, EXIT_REJECTED);
    }

    #[tokio::test]
    async fn missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let args = CheckArgs {
            spec: None,
            artifact: Some(dir.path().join("absent.oav.json")),
            request: r#"{"method":"get","route":"/items/{id}"}"#.to_string(),
        };
        assert!(run_check(&args, ValidatorOptions::default()).await.is_err());
    }
}

//! # Compile CLI
//!
//! `oav compile --spec <file> --out <artifact>` assembles every operation of
//! the document and writes a compiled artifact.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use oav_core::ValidatorOptions;
use oav_schema::compile_validator;

use crate::EXIT_OK;

/// Compile subcommand arguments.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// OpenAPI document (JSON or YAML).
    #[arg(long)]
    pub spec: PathBuf,

    /// Artifact to write.
    #[arg(long)]
    pub out: PathBuf,
}

/// Execute the compile subcommand.
pub async fn run_compile(args: &CompileArgs, options: ValidatorOptions) -> Result<u8> {
    let summary = compile_validator(args.spec.as_path(), options, &args.out)
        .await
        .with_context(|| format!("failed to compile {}", args.spec.display()))?;

    println!("  artifact:   {}", summary.path.display());
    println!("  operations: {}", summary.operations);
    println!("  keys:       {}", summary.keys);
    println!("  schemas:    {}", summary.schemas);
    println!("  digest:     {}", summary.digest);
    Ok(EXIT_OK)
}

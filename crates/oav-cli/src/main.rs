//! # oav CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oav_cli::check::{run_check, CheckArgs};
use oav_cli::compile::{run_compile, CompileArgs};
use oav_cli::inspect::{run_inspect, InspectArgs};
use oav_cli::{load_options, EXIT_ERROR};

/// OpenAPI request validator.
///
/// Compiles OpenAPI 3 documents into request-validation artifacts and checks
/// requests against a document or an artifact.
#[derive(Parser, Debug)]
#[command(name = "oav", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Validator options file (YAML or JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile every operation of a document into an artifact.
    Compile(CompileArgs),

    /// Validate one request against a document or an artifact.
    Check(CheckArgs),

    /// Summarize a compiled artifact.
    Inspect(InspectArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "oav starting");

    let result = match load_options(cli.config.as_deref()) {
        Ok(options) => match &cli.command {
            Commands::Compile(args) => run_compile(args, options).await,
            Commands::Check(args) => run_check(args, options).await,
            Commands::Inspect(args) => run_inspect(args).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_compile() {
        let cli = Cli::try_parse_from([
            "oav",
            "compile",
            "--spec",
            "petstore.yaml",
            "--out",
            "petstore.oav.json",
        ])
        .unwrap();
        if let Commands::Compile(args) = cli.command {
            assert_eq!(args.spec, PathBuf::from("petstore.yaml"));
            assert_eq!(args.out, PathBuf::from("petstore.oav.json"));
        } else {
            panic!("expected compile");
        }
    }

    #[test]
    fn cli_parse_compile_requires_out() {
        assert!(Cli::try_parse_from(["oav", "compile", "--spec", "petstore.yaml"]).is_err());
    }

    #[test]
    fn cli_parse_check_with_spec() {
        let cli = Cli::try_parse_from([
            "oav",
            "check",
            "--spec",
            "petstore.yaml",
            "--request",
            "request.json",
        ])
        .unwrap();
        if let Commands::Check(args) = cli.command {
            assert_eq!(args.spec, Some(PathBuf::from("petstore.yaml")));
            assert!(args.artifact.is_none());
            assert_eq!(args.request, "request.json");
        } else {
            panic!("expected check");
        }
    }

    #[test]
    fn cli_parse_check_with_artifact() {
        let cli = Cli::try_parse_from([
            "oav",
            "check",
            "--artifact",
            "petstore.oav.json",
            "--request",
            r#"{"method":"get","route":"/pets"}"#,
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Check(_)));
    }

    #[test]
    fn cli_parse_check_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["oav", "check", "--request", "r.json"]).is_err());
        assert!(Cli::try_parse_from([
            "oav",
            "check",
            "--spec",
            "a.yaml",
            "--artifact",
            "a.oav.json",
            "--request",
            "r.json",
        ])
        .is_err());
    }

    #[test]
    fn cli_parse_inspect() {
        let cli = Cli::try_parse_from(["oav", "inspect", "--artifact", "a.oav.json", "--json"])
            .unwrap();
        if let Commands::Inspect(args) = cli.command {
            assert_eq!(args.artifact, PathBuf::from("a.oav.json"));
            assert!(args.json);
        } else {
            panic!("expected inspect");
        }
    }

    #[test]
    fn cli_parse_verbose_levels() {
        let cli0 = Cli::try_parse_from(["oav", "inspect", "--artifact", "a"]).unwrap();
        assert_eq!(cli0.verbose, 0);

        let cli2 = Cli::try_parse_from(["oav", "-vv", "inspect", "--artifact", "a"]).unwrap();
        assert_eq!(cli2.verbose, 2);

        let cli3 = Cli::try_parse_from(["oav", "inspect", "--artifact", "a", "-vvv"]).unwrap();
        assert_eq!(cli3.verbose, 3);
    }

    #[test]
    fn cli_parse_config_option() {
        let cli = Cli::try_parse_from(["oav", "--config", "oav.yaml", "inspect", "--artifact", "a"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("oav.yaml")));
    }

    #[test]
    fn cli_parse_no_subcommand_errors() {
        assert!(Cli::try_parse_from(["oav"]).is_err());
    }
}

//! # cdev CLI entry point
//!
//! Parses command-line arguments, initialises tracing, and dispatches to
//! the subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cdev_cli::compile::{run_compile, CompileArgs};
use cdev_cli::config::CompilerConfig;
use cdev_cli::schema::{run_schema, SchemaArgs};
use cdev_cli::validate::{run_validate, ValidateArgs};

/// CDEvents toolchain.
///
/// Compiles event schemas into typed descriptors, validates event
/// instances, and inspects the built-in schema catalog.
#[derive(Parser, Debug)]
#[command(name = "cdev", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile event schemas into type descriptors.
    Compile(CompileArgs),

    /// Validate event JSON files.
    Validate(ValidateArgs),

    /// Inspect built-in schemas.
    Schema(SchemaArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "cdev starting");

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let repo_root = cdev_cli::find_repo_root(&cwd).unwrap_or_else(move || {
        tracing::debug!("no schemas/ directory above the working directory");
        cwd
    });

    let result = match &cli.command {
        Commands::Compile(args) => CompilerConfig::load_optional(args.config.as_deref())
            .and_then(|config| run_compile(args, &config, &repo_root)),
        Commands::Validate(args) => run_validate(args),
        Commands::Schema(args) => run_schema(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

/// Verbosity flags pick the level; without them `RUST_LOG` is honoured,
/// falling back to `warn`.
fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

//! # Compile Subcommand
//!
//! Compiles every schema in a directory and writes one JSON descriptor per
//! event type plus `index.json`. The batch is fail-fast: the first schema
//! that does not compile is reported and nothing is written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use cdev_schema::{compile_schemas, write_artifacts, JsonRenderer};

use crate::config::CompilerConfig;

/// Default output directory, relative to the repository root.
pub const DEFAULT_OUTPUT_DIR: &str = "generated";

/// Arguments for the `cdev compile` subcommand.
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Directory of event schemas (overrides the config file).
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Directory artifacts are written to (overrides the config file).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Compile and report without writing artifacts.
    #[arg(long)]
    pub dry_run: bool,

    /// Path to a compiler configuration file (YAML).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 on success, 1 if a schema failed to compile.
pub fn run_compile(args: &CompileArgs, config: &CompilerConfig, repo_root: &Path) -> Result<u8> {
    let schema_dir = args
        .schema_dir
        .clone()
        .or_else(|| config.schema_dir.clone())
        .unwrap_or_else(|| repo_root.join("schemas"));
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| repo_root.join(DEFAULT_OUTPUT_DIR));
    let overrides = config.effective_overrides();

    let index = match compile_schemas(&schema_dir, &overrides) {
        Ok(index) => index,
        Err(e) => {
            println!("FAIL: {e}");
            return Ok(1);
        }
    };

    println!(
        "Compiled {} event schema(s) from {}",
        index.len(),
        schema_dir.display()
    );
    for entry in index.entries() {
        println!("  {} -> {}", entry.event_type, entry.artifact);
    }

    if args.dry_run {
        println!("Dry run: nothing written.");
        return Ok(0);
    }

    let written = write_artifacts(&index, &JsonRenderer, &output_dir)
        .with_context(|| format!("failed to write artifacts to {}", output_dir.display()))?;
    println!(
        "Wrote {} artifact(s) to {}",
        written.len(),
        output_dir.display()
    );
    Ok(0)
}

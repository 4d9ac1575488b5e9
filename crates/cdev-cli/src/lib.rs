//! # cdev-cli: CDEvents Command-Line Interface
//!
//! Provides the `cdev` binary.
//!
//! ## Subcommands
//!
//! - `cdev compile`: compile a directory of event schemas into type
//!   descriptors and write them as artifacts.
//! - `cdev validate`: validate event JSON files against the built-in
//!   schemas and any custom schemas passed with `--schema`.
//! - `cdev schema`: list the built-in catalog or print a registered schema.
//!
//! ```bash
//! cdev compile --schema-dir schemas --output-dir generated
//! cdev validate event.json --schema my-tool.schema.json
//! cdev schema show dev.cdevents.pipelinerun.queued.0.2.0
//! ```
//!
//! Handlers return the process exit code: 0 on success, 1 when an input
//! failed to compile or validate. Operational errors are returned as
//! `anyhow::Error` and reported by `main`.

pub mod compile;
pub mod config;
pub mod schema;
pub mod validate;

use std::path::{Path, PathBuf};

/// Walk up from `start` to the first directory containing `schemas/`.
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join("schemas").is_dir())
        .map(Path::to_path_buf)
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve_path(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

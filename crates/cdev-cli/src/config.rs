//! # Compiler Configuration
//!
//! Optional YAML file passed with `--config`:
//!
//! ```yaml
//! schema_dir: schemas
//! output_dir: generated
//! naming_overrides:
//!   changeset: ChangeSet
//! ```
//!
//! Relative paths are resolved against the directory holding the file.
//! `naming_overrides` is layered over the built-in table.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use cdev_schema::NamingOverrides;

/// Settings for `cdev compile`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Directory of event schemas.
    pub schema_dir: Option<PathBuf>,
    /// Directory artifacts are written to.
    pub output_dir: Option<PathBuf>,
    /// Extra raw token -> target name overrides.
    pub naming_overrides: NamingOverrides,
}

impl CompilerConfig {
    /// Parse YAML text. Paths are left as written.
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes as YAML null.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Read a config file and resolve its relative paths.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::from_yaml_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.schema_dir = config.schema_dir.map(|p| crate::resolve_path(&p, base));
        config.output_dir = config.output_dir.map(|p| crate::resolve_path(&p, base));

        tracing::debug!(
            path = %path.display(),
            overrides = config.naming_overrides.len(),
            "loaded compiler config"
        );
        Ok(config)
    }

    /// Load `path` when given, otherwise the defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// The built-in overrides with this file's overrides on top.
    pub fn effective_overrides(&self) -> NamingOverrides {
        let mut overrides = NamingOverrides::builtin();
        overrides.merge(&self.naming_overrides);
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = CompilerConfig::from_yaml_str(
            "schema_dir: defs/schemas\noutput_dir: out\nnaming_overrides:\n  changeset: ChangeSet\n",
        )
        .unwrap();
        assert_eq!(config.schema_dir, Some(PathBuf::from("defs/schemas")));
        assert_eq!(config.output_dir, Some(PathBuf::from("out")));
        assert_eq!(config.naming_overrides.get("changeset"), Some("ChangeSet"));
    }

    #[test]
    fn empty_config_is_default() {
        assert_eq!(
            CompilerConfig::from_yaml_str("").unwrap(),
            CompilerConfig::default()
        );
        assert_eq!(
            CompilerConfig::from_yaml_str("{}").unwrap(),
            CompilerConfig::default()
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(CompilerConfig::from_yaml_str("schemadir: x\n").is_err());
    }

    #[test]
    fn file_overrides_layer_over_builtin() {
        let config =
            CompilerConfig::from_yaml_str("naming_overrides:\n  taskrun: Taskrun\n").unwrap();
        let overrides = config.effective_overrides();
        assert_eq!(overrides.resolve("taskrun"), "Taskrun");
        assert_eq!(overrides.resolve("pipelinerun"), "PipelineRun");
    }

    #[test]
    fn load_resolves_paths_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cdev.yaml");
        std::fs::write(&path, "schema_dir: schemas\noutput_dir: /abs/out\n").unwrap();

        let config = CompilerConfig::load(&path).unwrap();
        assert_eq!(config.schema_dir, Some(dir.path().join("schemas")));
        assert_eq!(config.output_dir, Some(PathBuf::from("/abs/out")));
    }

    #[test]
    fn load_missing_file_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = CompilerConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(format!("{err:#}").contains("absent.yaml"));
    }

    #[test]
    fn load_optional_defaults_without_path() {
        assert_eq!(
            CompilerConfig::load_optional(None).unwrap(),
            CompilerConfig::default()
        );
    }
}

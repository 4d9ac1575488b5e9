//! # Validate Subcommand
//!
//! Validates event JSON files. Core events are checked against the
//! built-in schema for their type; custom events against the custom-event
//! envelope. Schemas passed with `--schema` are registered under their
//! `$id` first, so events naming them in `schemaUri` are checked too.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde_json::Value;

use cdev_schema::{EventValidator, SchemaRegistry};

/// Arguments for the `cdev validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Event JSON files to validate.
    #[arg(value_name = "EVENT", required = true)]
    pub events: Vec<PathBuf>,

    /// Custom schema to register before validating (repeatable).
    #[arg(long = "schema", value_name = "SCHEMA")]
    pub schemas: Vec<PathBuf>,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 if every event is valid, 1 otherwise.
pub fn run_validate(args: &ValidateArgs) -> Result<u8> {
    let validator =
        EventValidator::with_builtin_schemas().context("failed to load built-in schemas")?;

    for path in &args.schemas {
        let id = register_schema_file(validator.registry(), path)?;
        println!("Registered {} as {id}", path.display());
    }

    let total = args.events.len();
    let mut passed = 0usize;
    for path in &args.events {
        if validate_event_file(&validator, path) {
            passed += 1;
        }
    }

    println!("Events: {passed}/{total} passed");
    Ok(if passed == total { 0 } else { 1 })
}

/// Register a schema file under its `$id`, returning the id.
pub fn register_schema_file(registry: &SchemaRegistry, path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read schema {}", path.display()))?;
    let schema: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("schema {} is not valid JSON", path.display()))?;
    let Some(id) = schema.get("$id").and_then(Value::as_str).filter(|id| !id.is_empty()) else {
        bail!("schema {} has no $id to register it under", path.display());
    };
    let id = id.to_string();

    registry
        .register(id.clone(), &bytes)
        .with_context(|| format!("failed to register schema {}", path.display()))?;
    Ok(id)
}

/// Validate one event file and print the outcome. Returns `true` on success.
fn validate_event_file(validator: &EventValidator, path: &Path) -> bool {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            println!("ERROR: cannot read {}: {e}", path.display());
            return false;
        }
    };

    match validator.validate_json(&text) {
        Ok(()) => {
            println!("OK: {}", path.display());
            true
        }
        Err(e) => {
            println!("FAIL: {}: {e}", path.display());
            if e.is_schema_not_found() {
                println!("  hint: pass the schema with --schema <FILE>");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdev_core::{Event, EventType, FixedClock, FixedIdGenerator, Timestamp};

    const CUSTOM_ID: &str = "https://example.com/schema/mytool-resource-created";

    fn write_event(dir: &Path, name: &str, event: &Event) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, event.to_json_pretty().unwrap()).unwrap();
        path
    }

    fn pipeline_event() -> Event {
        Event::builder(EventType::parse("dev.cdevents.pipelinerun.queued.0.2.0").unwrap())
            .source("/ci")
            .subject_id("run-1")
            .subject_type("pipelineRun")
            .content_field("pipelineName", "deploy")
            .build(
                &FixedIdGenerator("e-1".to_string()),
                &FixedClock(Timestamp::parse("2024-03-01T12:00:00Z").unwrap()),
            )
            .unwrap()
    }

    fn custom_event(schema_uri: &str) -> Event {
        Event::builder(EventType::parse("dev.cdeventsx.mytool-resource.created.0.1.0").unwrap())
            .source("/mytool")
            .subject_id("res-1")
            .subject_type("resource")
            .content_field("user", "alice")
            .schema_uri(schema_uri)
            .build(
                &FixedIdGenerator("e-2".to_string()),
                &FixedClock(Timestamp::parse("2024-03-01T12:00:00Z").unwrap()),
            )
            .unwrap()
    }

    fn custom_schema(dir: &Path) -> PathBuf {
        let path = dir.join("mytool.schema.json");
        std::fs::write(
            &path,
            serde_json::json!({
                "$id": CUSTOM_ID,
                "properties": {"subject": {"properties": {"content": {
                    "required": ["user"]
                }}}}
            })
            .to_string(),
        )
        .unwrap();
        path
    }

    #[test]
    fn valid_event_returns_0() {
        let dir = tempfile::tempdir().unwrap();
        let event = write_event(dir.path(), "e.json", &pipeline_event());
        let args = ValidateArgs {
            events: vec![event],
            schemas: vec![],
        };
        assert_eq!(run_validate(&args).unwrap(), 0);
    }

    #[test]
    fn invalid_or_missing_event_returns_1() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_event(dir.path(), "good.json", &pipeline_event());
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, r#"{"context": {"type": "dev.cdevents.pipelinerun.queued.0.2.0"}}"#)
            .unwrap();
        let args = ValidateArgs {
            events: vec![good, bad, dir.path().join("absent.json")],
            schemas: vec![],
        };
        assert_eq!(run_validate(&args).unwrap(), 1);
    }

    #[test]
    fn custom_schema_flag_registers_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let schema = custom_schema(dir.path());
        let event = write_event(dir.path(), "c.json", &custom_event(CUSTOM_ID));

        let without = ValidateArgs {
            events: vec![event.clone()],
            schemas: vec![],
        };
        assert_eq!(run_validate(&without).unwrap(), 1);

        let with = ValidateArgs {
            events: vec![event],
            schemas: vec![schema],
        };
        assert_eq!(run_validate(&with).unwrap(), 0);
    }

    #[test]
    fn schema_without_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("anon.json");
        std::fs::write(&schema, r#"{"type": "object"}"#).unwrap();
        let registry = SchemaRegistry::new();
        let err = register_schema_file(&registry, &schema).unwrap_err();
        assert!(err.to_string().contains("no $id"), "{err}");
    }

    #[test]
    fn register_schema_file_returns_id() {
        let dir = tempfile::tempdir().unwrap();
        let schema = custom_schema(dir.path());
        let registry = SchemaRegistry::new();
        assert_eq!(register_schema_file(&registry, &schema).unwrap(), CUSTOM_ID);
        assert!(registry.contains(CUSTOM_ID));
    }
}

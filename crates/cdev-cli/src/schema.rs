//! # Schema Subcommand
//!
//! Inspects the built-in schema catalog.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use cdev_core::EventType;
use cdev_schema::{EventValidator, CUSTOM_EVENT_SCHEMA_ID};

/// Arguments for the `cdev schema` subcommand.
#[derive(Args, Debug)]
pub struct SchemaArgs {
    #[command(subcommand)]
    pub command: SchemaCommand,
}

/// `cdev schema` operations.
#[derive(Subcommand, Debug)]
pub enum SchemaCommand {
    /// List built-in event types and their schema ids.
    List,

    /// Print a built-in schema by `$id` or by event type string.
    Show {
        /// Schema `$id`, or a full event type such as
        /// `dev.cdevents.taskrun.started.0.2.0`.
        #[arg(value_name = "ID_OR_TYPE")]
        target: String,

        /// Print whitespace-free JSON instead of pretty JSON.
        #[arg(long)]
        compact: bool,
    },
}

/// Execute the schema subcommand.
///
/// Returns exit code: 0 on success, 1 if the requested schema is unknown.
pub fn run_schema(args: &SchemaArgs) -> Result<u8> {
    let validator =
        EventValidator::with_builtin_schemas().context("failed to load built-in schemas")?;

    match &args.command {
        SchemaCommand::List => {
            for event in validator.catalog().events() {
                println!("{}\t{}", event.descriptor.type_string, event.schema_id);
            }
            println!("(custom)\t{CUSTOM_EVENT_SCHEMA_ID}");
            Ok(0)
        }
        SchemaCommand::Show { target, compact } => {
            let id = resolve_schema_id(&validator, target);
            match validator.registry().lookup(&id) {
                Ok(schema) => {
                    if *compact {
                        println!("{}", schema.compact());
                    } else {
                        println!("{}", serde_json::to_string_pretty(schema.schema())?);
                    }
                    Ok(0)
                }
                Err(e) => {
                    println!("ERROR: {e}");
                    Ok(1)
                }
            }
        }
    }
}

/// Map an event type string to its catalogued schema id; anything else is
/// taken as an id.
fn resolve_schema_id(validator: &EventValidator, target: &str) -> String {
    EventType::parse(target)
        .ok()
        .and_then(|t| validator.catalog().schema_id_for(&t).map(str::to_string))
        .unwrap_or_else(|| target.to_string())
}

//! # cdev-schema: Event Schema Compiler & Runtime Registry
//!
//! Two halves share this crate.
//!
//! ## Build time (`cdev compile`)
//!
//! [`document`] parses a JSON Schema file, [`infer`] walks it into an
//! [`EventTypeDescriptor`] (scalar fields, shared `Reference` fields, and
//! minted nested types, all in a stable order), [`naming`] turns raw
//! schema tokens into target names, and [`codegen`] runs the whole
//! directory as one fail-fast batch and hands the result to a
//! [`Renderer`].
//!
//! ## Run time
//!
//! [`registry`] holds compiled schemas by id behind a reader/writer lock,
//! [`catalog`] embeds the built-in schemas, and [`validate`] checks event
//! instances against the built-in schema for their type and against the
//! schema named by their `schemaUri`.
//!
//! ## Crate Policy
//!
//! - Depends only on `cdev-core` internally.
//! - Schema `$ref`s are resolved from the registry, never the network.
//! - Compile errors always name the schema location and JSON Pointer.

pub mod catalog;
pub mod codegen;
pub mod document;
pub mod error;
pub mod infer;
pub mod naming;
pub mod registry;
pub mod validate;

pub use catalog::{BuiltinSchema, Catalog, BUILTIN_SCHEMAS, CUSTOM_EVENT_SCHEMA_ID};
pub use codegen::{
    compile_document, compile_schema_file, compile_schema_str, compile_schemas, write_artifacts,
    Artifact, CompiledEvent, EventIndex, IndexEntry, JsonRenderer, Renderer,
};
pub use document::{compact_json, SchemaDocument};
pub use error::CodegenError;
pub use infer::{
    infer, ContentField, ContentType, EventTypeDescriptor, FieldKind, REFERENCE_TYPE_NAME,
};
pub use naming::{resolve_name, NamingOverrides};
pub use registry::{RegisteredSchema, RegistryError, SchemaRegistry, Violation, Violations};
pub use validate::{EventValidationError, EventValidator};

//! # Compile-Time Errors
//!
//! Every schema structure error carries the schema's location (file path
//! or caller-supplied label) and the JSON Pointer of the offending node,
//! so a failed batch compile names exactly what to fix.

use cdev_core::CoreError;
use thiserror::Error;

/// Error raised while compiling event schemas into descriptors.
#[derive(Error, Debug)]
pub enum CodegenError {
    /// The schema text is not JSON.
    #[error("{location}: invalid JSON: {reason}")]
    InvalidJson {
        /// Schema file path or label.
        location: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The document is JSON but not a valid JSON Schema.
    #[error("{location}: not a valid JSON Schema: {reason}")]
    InvalidSchema {
        /// Schema file path or label.
        location: String,
        /// Metaschema diagnostic.
        reason: String,
    },

    /// A property the compiler requires is absent or not an object.
    #[error("{location}: missing schema property {pointer}")]
    MissingProperty {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the expected node.
        pointer: String,
    },

    /// An `enum` that must pin exactly one literal has zero or several.
    #[error("{location}: {pointer} must declare exactly one enum value, found {count}")]
    EnumCardinality {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the property declaring the enum.
        pointer: String,
        /// Number of enum values found.
        count: usize,
    },

    /// The pinned enum literal is not a non-empty string.
    #[error("{location}: {pointer} enum value must be a non-empty string")]
    InvalidEnumValue {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the property declaring the enum.
        pointer: String,
    },

    /// The pinned `context.type` literal does not follow the type grammar.
    #[error("{location}: {pointer}: {source}")]
    InvalidEventType {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of `context.type`.
        pointer: String,
        /// Grammar violation.
        #[source]
        source: CoreError,
    },

    /// A content property declares no type, or more than one.
    #[error("{location}: {pointer} must declare exactly one type, found {count}")]
    TypeCardinality {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the property.
        pointer: String,
        /// Number of declared types.
        count: usize,
    },

    /// A content property declares a type other than `string` or `object`.
    #[error("{location}: {pointer} has unsupported type {found:?}")]
    UnsupportedType {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the property.
        pointer: String,
        /// The declared type.
        found: String,
    },

    /// A nested content object itself contains an object property.
    #[error("{location}: {pointer} nests an object inside a nested content object")]
    NestedTooDeep {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the inner object property.
        pointer: String,
    },

    /// A node has the wrong JSON shape (e.g. `required` is not a string array).
    #[error("{location}: {pointer}: {reason}")]
    Malformed {
        /// Schema file path or label.
        location: String,
        /// JSON Pointer of the node.
        pointer: String,
        /// What was expected.
        reason: String,
    },

    /// Two properties of one object resolve to the same target name.
    #[error("{location}: {first} and {second} both resolve to name {name}")]
    NameCollision {
        /// Schema file path or label.
        location: String,
        /// The shared resolved name.
        name: String,
        /// JSON Pointer of the property that claimed the name first.
        first: String,
        /// JSON Pointer of the colliding property.
        second: String,
    },

    /// Two schemas in one batch map to the same output artifact.
    #[error("{location}: artifact {artifact} already produced by {first}")]
    DuplicateArtifact {
        /// Schema file path or label of the later schema.
        location: String,
        /// Colliding artifact file name.
        artifact: String,
        /// Location of the schema that produced it first.
        first: String,
    },

    /// Reading the schema directory or writing artifacts failed.
    #[error("io error on {path}: {source}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The rendering stage failed.
    #[error("render error for {artifact}: {reason}")]
    Render {
        /// Artifact being rendered.
        artifact: String,
        /// Renderer diagnostic.
        reason: String,
    },
}

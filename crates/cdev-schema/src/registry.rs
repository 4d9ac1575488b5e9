//! # Schema Registry
//!
//! Runtime store mapping a schema identifier (URI) to a compiled JSON
//! Schema. Events are validated against the schema registered under their
//! built-in `$id` or their `schemaUri`.
//!
//! ## Concurrency
//!
//! The map sits behind a `parking_lot::RwLock`. Validation holds the read
//! lock only long enough to clone an `Arc` to the entry, so any number of
//! threads validate in parallel. Registration compiles the validator
//! *outside* the lock and then swaps the finished entry in under the write
//! lock, so a concurrent reader sees either the old entry or the new one,
//! never a partially built schema.
//!
//! ## `$ref` resolution
//!
//! A schema may `$ref` any other registered schema by id or `$id`. The
//! references are resolved from the registry's contents when a validator
//! is built; nothing is ever fetched over the network. Replacing an id
//! rebuilds every entry that references another document, so the last
//! registration wins for direct and indirect validation alike. If a
//! dependent no longer compiles against the replacement, the
//! registration fails and the registry is left unchanged.
//!
//! Registrations are serialised by a writer mutex so that a rebuild never
//! races another registration. Readers never take that mutex.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jsonschema::{Retrieve, Uri, Validator};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::document::compact_json;

/// Error raised by [`SchemaRegistry`] operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The bytes passed to `register` are not a valid JSON Schema.
    #[error("invalid schema for id {id}: {reason}")]
    InvalidSchema {
        /// Identifier the schema was being registered under.
        id: String,
        /// Parser or metaschema diagnostic.
        reason: String,
    },

    /// No schema is registered under the requested id.
    #[error("schema with id {id} could not be found")]
    NotFound {
        /// The requested id.
        id: String,
    },

    /// The instance bytes are not JSON.
    #[error("instance is not valid JSON (schema {id}): {reason}")]
    InvalidInstance {
        /// Schema the instance was to be validated against.
        id: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// The instance does not conform to the schema.
    #[error("validation failed against schema {id}:\n{violations}")]
    ValidationFailed {
        /// Schema the instance was validated against.
        id: String,
        /// Every violated constraint.
        violations: Violations,
    },
}

impl RegistryError {
    /// Whether this is the [`RegistryError::NotFound`] condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound { .. })
    }
}

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON Pointer to the violating node in the instance.
    pub instance_path: String,
    /// JSON Pointer to the schema keyword that rejected it.
    pub schema_path: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.instance_path, self.message)
        }
    }
}

/// Every violation reported for one instance, in validator order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    /// Number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are none.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the violations.
    pub fn as_slice(&self) -> &[Violation] {
        &self.0
    }

    /// Consume into the inner `Vec`.
    pub fn into_inner(self) -> Vec<Violation> {
        self.0
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// One registry entry: the raw bytes, the parsed schema, and its compiled
/// validator.
pub struct RegisteredSchema {
    id: String,
    raw: Vec<u8>,
    schema: Value,
    validator: Validator,
}

impl RegisteredSchema {
    /// The id this schema is registered under.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The bytes passed at registration.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The parsed schema.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Whitespace-free schema text with sorted keys.
    pub fn compact(&self) -> String {
        compact_json(&self.schema)
    }

    /// Validate an instance against this schema.
    ///
    /// # Errors
    ///
    /// [`RegistryError::ValidationFailed`] listing every violation.
    pub fn validate(&self, instance: &Value) -> Result<(), RegistryError> {
        let violations: Vec<Violation> = self
            .validator
            .iter_errors(instance)
            .map(|e| Violation {
                instance_path: e.instance_path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::ValidationFailed {
                id: self.id.clone(),
                violations: violations.into(),
            })
        }
    }
}

impl fmt::Debug for RegisteredSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredSchema")
            .field("id", &self.id)
            .field("raw_len", &self.raw.len())
            .finish_non_exhaustive()
    }
}

/// Concurrent id -> schema store.
///
/// Construct once and share behind an `Arc`. There is no unregister; the
/// last registration for an id wins.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Arc<RegisteredSchema>>>,
    writer: Mutex<()>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with every built-in event schema and the
    /// custom-event envelope schema.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidSchema`] if an embedded schema fails to
    /// compile, which means the crate was built from a broken `schemas/`.
    pub fn with_builtin_schemas() -> Result<Self, RegistryError> {
        let catalog = Catalog::builtin().map_err(|e| RegistryError::InvalidSchema {
            id: "built-in catalog".to_string(),
            reason: e.to_string(),
        })?;
        let registry = Self::new();
        catalog.load_into(&registry)?;
        Ok(registry)
    }

    /// Parse and register the schema in `raw` under `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidSchema`] if `raw` is not JSON or not a
    /// valid JSON Schema. The registry is unchanged on error.
    pub fn register(&self, id: impl Into<String>, raw: &[u8]) -> Result<(), RegistryError> {
        let id = id.into();
        let schema: Value =
            serde_json::from_slice(raw).map_err(|e| RegistryError::InvalidSchema {
                id: id.clone(),
                reason: e.to_string(),
            })?;
        self.insert(id, raw.to_vec(), schema)
    }

    /// Register an already-parsed schema under `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::InvalidSchema`] if `schema` is not a valid JSON
    /// Schema.
    pub fn register_value(&self, id: impl Into<String>, schema: Value) -> Result<(), RegistryError> {
        let raw = schema.to_string().into_bytes();
        self.insert(id.into(), raw, schema)
    }

    fn insert(&self, id: String, raw: Vec<u8>, schema: Value) -> Result<(), RegistryError> {
        let _writer = self.writer.lock();

        let mut staged = self.schemas.read().clone();
        let entry = compile_entry(id.clone(), raw, schema, &staged)?;
        let previous = staged.insert(id.clone(), Arc::new(entry));

        let mut rebuilt = 0usize;
        if previous.is_some() {
            let dependents: Vec<Arc<RegisteredSchema>> = staged
                .values()
                .filter(|e| e.id != id && has_external_ref(&e.schema))
                .cloned()
                .collect();
            for dependent in dependents {
                let fresh = compile_entry(
                    dependent.id.clone(),
                    dependent.raw.clone(),
                    dependent.schema.clone(),
                    &staged,
                )
                .map_err(|e| RegistryError::InvalidSchema {
                    id: id.clone(),
                    reason: format!("breaks dependent schema {}: {e}", dependent.id),
                })?;
                staged.insert(dependent.id.clone(), Arc::new(fresh));
                rebuilt += 1;
            }
        }

        *self.schemas.write() = staged;
        if previous.is_some() {
            tracing::warn!(
                schema_id = %id,
                rebuilt,
                "schema registration replaced an existing entry"
            );
        } else {
            tracing::debug!(schema_id = %id, "registered schema");
        }
        Ok(())
    }

    /// The entry registered under `id`.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] if nothing is registered under `id`.
    pub fn lookup(&self, id: &str) -> Result<Arc<RegisteredSchema>, RegistryError> {
        self.schemas
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Validate instance bytes against the schema registered under `id`.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotFound`] for an unregistered id.
    /// - [`RegistryError::InvalidInstance`] if `instance` is not JSON.
    /// - [`RegistryError::ValidationFailed`] if it does not conform.
    pub fn validate(&self, id: &str, instance: &[u8]) -> Result<(), RegistryError> {
        let schema = self.lookup(id)?;
        let instance: Value =
            serde_json::from_slice(instance).map_err(|e| RegistryError::InvalidInstance {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        schema.validate(&instance)
    }

    /// Validate a parsed instance against the schema registered under `id`.
    ///
    /// # Errors
    ///
    /// As [`SchemaRegistry::validate`], minus the JSON parse failure.
    pub fn validate_value(&self, id: &str, instance: &Value) -> Result<(), RegistryError> {
        self.lookup(id)?.validate(instance)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schemas.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.schemas.read().is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.schemas.read().contains_key(id)
    }
}

/// Build the registry entry for `schema`, resolving refs from `entries`.
fn compile_entry(
    id: String,
    raw: Vec<u8>,
    schema: Value,
    entries: &HashMap<String, Arc<RegisteredSchema>>,
) -> Result<RegisteredSchema, RegistryError> {
    let retriever = LocalSchemaRetriever::from_entries(entries.values());
    let validator =
        build_validator(&schema, retriever).map_err(|reason| RegistryError::InvalidSchema {
            id: id.clone(),
            reason,
        })?;
    Ok(RegisteredSchema {
        id,
        raw,
        schema,
        validator,
    })
}

/// Whether `schema` holds a `$ref` to another document (anything but a
/// bare `#...` fragment).
fn has_external_ref(schema: &Value) -> bool {
    match schema {
        Value::Object(map) => map.iter().any(|(key, value)| match (key.as_str(), value) {
            ("$ref", Value::String(target)) => !target.starts_with('#'),
            _ => has_external_ref(value),
        }),
        Value::Array(items) => items.iter().any(has_external_ref),
        _ => false,
    }
}

/// Resolves `$ref` URIs from schemas already in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct LocalSchemaRetriever {
    schemas_by_uri: HashMap<String, Value>,
}

impl LocalSchemaRetriever {
    /// Index each entry under its registration id and its `$id`.
    fn from_entries<'a>(entries: impl Iterator<Item = &'a Arc<RegisteredSchema>>) -> Self {
        let mut retriever = Self::default();
        for entry in entries {
            retriever.insert(entry.id.clone(), &entry.schema);
        }
        retriever
    }

    /// Make `schema` resolvable under `uri` and under its own `$id`.
    pub(crate) fn insert(&mut self, uri: String, schema: &Value) {
        if let Some(own_id) = schema.get("$id").and_then(Value::as_str) {
            self.schemas_by_uri
                .insert(own_id.to_string(), schema.clone());
        }
        self.schemas_by_uri.insert(uri, schema.clone());
    }

    /// Number of resolvable URIs.
    pub(crate) fn len(&self) -> usize {
        self.schemas_by_uri.len()
    }
}

impl Retrieve for LocalSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        self.schemas_by_uri
            .get(uri_str)
            .or_else(|| self.schemas_by_uri.get(uri_str.trim_end_matches('#')))
            .cloned()
            .ok_or_else(|| format!("referenced schema {uri_str} is not registered").into())
    }
}

/// Compile `schema` as Draft 2020-12 with format assertions enabled.
pub(crate) fn build_validator(
    schema: &Value,
    retriever: LocalSchemaRetriever,
) -> Result<Validator, String> {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.should_validate_formats(true);
    opts.with_retriever(retriever);
    opts.build(schema).map_err(|e| e.to_string())
}

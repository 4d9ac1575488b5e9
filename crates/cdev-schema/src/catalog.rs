//! # Built-in Schema Catalog
//!
//! Every event schema under the repository's `schemas/` directory is
//! embedded at build time and compiled through the same pipeline as
//! `cdev compile`. The catalog maps each core event type (without its
//! version) to the `$id` of its schema, so the validator can find the
//! schema for an event from its `context.type` alone.
//!
//! The custom-event envelope schema lives in `schemas/custom/`, outside
//! the directory a batch compile walks, and is registered separately.

use std::collections::BTreeMap;

use cdev_core::EventType;

use crate::codegen::{compile_schema_str, CompiledEvent};
use crate::error::CodegenError;
use crate::naming::NamingOverrides;
use crate::registry::{RegistryError, SchemaRegistry};

/// A schema embedded in the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSchema {
    /// Path relative to `schemas/`.
    pub file_name: &'static str,
    /// The schema text.
    pub source: &'static str,
}

macro_rules! builtin_schema {
    ($file:literal) => {
        BuiltinSchema {
            file_name: $file,
            source: include_str!(concat!("../../../schemas/", $file)),
        }
    };
}

/// Core event schemas, in file-name order.
pub const BUILTIN_SCHEMAS: &[BuiltinSchema] = &[
    builtin_schema!("artifact-packaged.json"),
    builtin_schema!("artifact-published.json"),
    builtin_schema!("build-finished.json"),
    builtin_schema!("build-queued.json"),
    builtin_schema!("pipelinerun-finished.json"),
    builtin_schema!("pipelinerun-queued.json"),
    builtin_schema!("pipelinerun-started.json"),
    builtin_schema!("service-deployed.json"),
    builtin_schema!("taskrun-finished.json"),
    builtin_schema!("taskrun-started.json"),
    builtin_schema!("testcaserun-started.json"),
    builtin_schema!("ticket-closed.json"),
    builtin_schema!("ticket-created.json"),
];

/// Envelope schema every custom event must satisfy.
pub const CUSTOM_EVENT_SCHEMA: BuiltinSchema = builtin_schema!("custom/schema.json");

/// `$id` of [`CUSTOM_EVENT_SCHEMA`].
pub const CUSTOM_EVENT_SCHEMA_ID: &str = "https://cdevents.dev/0.4.1/schema/custom";

/// Core event types and the compiled schemas backing them.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    by_type: BTreeMap<String, CompiledEvent>,
}

impl Catalog {
    /// Compile the embedded [`BUILTIN_SCHEMAS`].
    ///
    /// # Errors
    ///
    /// The first [`CodegenError`]; only possible if `schemas/` is broken.
    pub fn builtin() -> Result<Self, CodegenError> {
        let overrides = NamingOverrides::builtin();
        let compiled = BUILTIN_SCHEMAS
            .iter()
            .map(|s| compile_schema_str(s.file_name, s.source, &overrides))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_compiled(compiled))
    }

    /// Build a catalog from compiled core events. Custom event types are
    /// ignored since they are resolved through `schemaUri`. A later entry
    /// for the same unversioned type replaces an earlier one.
    pub fn from_compiled(events: impl IntoIterator<Item = CompiledEvent>) -> Self {
        let mut by_type = BTreeMap::new();
        for event in events {
            if event.descriptor.custom.is_some() {
                continue;
            }
            let key = unversioned_key(&event.descriptor.subject, &event.descriptor.predicate);
            by_type.insert(key, event);
        }
        Self { by_type }
    }

    /// The compiled schema for a core event type, matched on subject and
    /// predicate. `None` for custom types.
    pub fn lookup(&self, event_type: &EventType) -> Option<&CompiledEvent> {
        if event_type.is_custom() {
            return None;
        }
        self.by_type
            .get(&unversioned_key(event_type.subject(), event_type.predicate()))
    }

    /// `$id` of the schema for a core event type.
    pub fn schema_id_for(&self, event_type: &EventType) -> Option<&str> {
        self.lookup(event_type).map(|e| e.schema_id.as_str())
    }

    /// Catalogued events ordered by unversioned type string.
    pub fn events(&self) -> impl Iterator<Item = &CompiledEvent> {
        self.by_type.values()
    }

    /// Number of catalogued event types.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Register every catalogued schema plus the custom-event envelope.
    ///
    /// # Errors
    ///
    /// The first [`RegistryError`] raised by the registry.
    pub fn load_into(&self, registry: &SchemaRegistry) -> Result<(), RegistryError> {
        for event in self.by_type.values() {
            event.register_into(registry)?;
        }
        registry.register(CUSTOM_EVENT_SCHEMA_ID, CUSTOM_EVENT_SCHEMA.source.as_bytes())?;
        tracing::debug!(schemas = self.by_type.len() + 1, "loaded built-in schemas");
        Ok(())
    }
}

fn unversioned_key(subject: &str, predicate: &str) -> String {
    format!("{subject}.{predicate}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdev_core::Version;
    use serde_json::Value;

    #[test]
    fn builtin_catalog_covers_every_embedded_schema() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.len(), BUILTIN_SCHEMAS.len());
    }

    #[test]
    fn builtin_list_is_sorted() {
        let names: Vec<&str> = BUILTIN_SCHEMAS.iter().map(|s| s.file_name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn lookup_ignores_version() {
        let catalog = Catalog::builtin().unwrap();
        let current = EventType::parse("dev.cdevents.pipelinerun.queued.0.2.0").unwrap();
        let future = EventType::new("pipelinerun", "queued", Version::new(0, 9, 0)).unwrap();
        assert_eq!(
            catalog.schema_id_for(&current),
            Some("https://cdevents.dev/0.4.1/schema/pipeline-run-queued-event")
        );
        assert_eq!(catalog.schema_id_for(&future), catalog.schema_id_for(&current));
    }

    #[test]
    fn unknown_and_custom_types_are_absent() {
        let catalog = Catalog::builtin().unwrap();
        let unknown = EventType::parse("dev.cdevents.rocket.launched.0.1.0").unwrap();
        assert!(catalog.lookup(&unknown).is_none());

        let custom = EventType::parse("dev.cdeventsx.mytool-build.queued.0.2.0").unwrap();
        assert!(catalog.lookup(&custom).is_none());
    }

    #[test]
    fn custom_envelope_id_matches_constant() {
        let schema: Value = serde_json::from_str(CUSTOM_EVENT_SCHEMA.source).unwrap();
        assert_eq!(schema["$id"], CUSTOM_EVENT_SCHEMA_ID);
    }

    #[test]
    fn load_into_registers_catalog_and_envelope() {
        let catalog = Catalog::builtin().unwrap();
        let registry = SchemaRegistry::new();
        catalog.load_into(&registry).unwrap();
        assert_eq!(registry.len(), catalog.len() + 1);
        for event in catalog.events() {
            assert!(registry.contains(&event.schema_id), "{}", event.schema_id);
        }
        assert!(registry.contains(CUSTOM_EVENT_SCHEMA_ID));
    }
}

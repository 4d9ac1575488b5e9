//! # Event Validator
//!
//! Validates event instances against the registry:
//!
//! - A core event (`dev.cdevents.*`) must conform to the built-in schema
//!   the [`Catalog`] maps its subject and predicate to. A core type the
//!   catalog does not know is rejected.
//! - A custom event (`dev.cdeventsx.*`) must conform to the custom-event
//!   envelope schema.
//! - Either kind, when it names a schema in `context.schemaUri`, must also
//!   conform to that schema. An empty or absent `schemaUri` means "no
//!   custom schema" and is not an error; a `schemaUri` that is not
//!   registered is.
//!
//! Schema conformance is followed by the context invariants a schema
//! cannot express: `specversion` must be `MAJOR.MINOR.PATCH`, and
//! `schemaUri` / `chainId` / `links` are only allowed from spec 0.4.0 on.

use std::borrow::Cow;
use std::sync::Arc;

use cdev_core::{Context, CoreError, Event, EventType, LINKS_SPEC_VERSION};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::{Catalog, CUSTOM_EVENT_SCHEMA_ID};
use crate::error::CodegenError;
use crate::registry::{RegisteredSchema, RegistryError, SchemaRegistry};

/// Error returned by [`EventValidator`].
#[derive(Error, Debug)]
pub enum EventValidationError {
    /// The input is not JSON, or not shaped like an event.
    #[error("malformed event: {0}")]
    Malformed(String),

    /// `context.type` does not follow the type grammar.
    #[error("invalid event type: {0}")]
    InvalidType(#[source] CoreError),

    /// A context invariant outside the schema does not hold.
    #[error("invalid event context: {0}")]
    InvalidContext(String),

    /// A core event type with no built-in schema.
    #[error("unknown event type {0}")]
    UnknownEventType(String),

    /// Schema lookup or conformance failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The embedded schemas failed to compile.
    #[error("built-in schema catalog: {0}")]
    Catalog(#[from] CodegenError),
}

impl EventValidationError {
    /// Whether the failure is a `schemaUri` (or built-in `$id`) that is not
    /// registered.
    pub fn is_schema_not_found(&self) -> bool {
        matches!(self, EventValidationError::Registry(e) if e.is_not_found())
    }
}

/// Validates events against a shared [`SchemaRegistry`].
#[derive(Debug, Clone)]
pub struct EventValidator {
    registry: Arc<SchemaRegistry>,
    catalog: Arc<Catalog>,
}

impl EventValidator {
    /// A validator over `registry`, resolving core types through `catalog`.
    ///
    /// The catalog's schemas are expected to be registered already; see
    /// [`Catalog::load_into`].
    pub fn new(registry: Arc<SchemaRegistry>, catalog: Catalog) -> Self {
        Self {
            registry,
            catalog: Arc::new(catalog),
        }
    }

    /// A validator over a fresh registry holding the built-in schemas.
    ///
    /// # Errors
    ///
    /// Only if the embedded schemas are broken.
    pub fn with_builtin_schemas() -> Result<Self, EventValidationError> {
        let catalog = Catalog::builtin()?;
        let registry = SchemaRegistry::new();
        catalog.load_into(&registry)?;
        Ok(Self::new(Arc::new(registry), catalog))
    }

    /// The shared registry. Register custom schemas here.
    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// The built-in catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Validate a typed event.
    ///
    /// # Errors
    ///
    /// See [`EventValidator::validate_value`].
    pub fn validate(&self, event: &Event) -> Result<(), EventValidationError> {
        let instance = event
            .to_value()
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;
        self.validate_value(&instance)
    }

    /// Validate event JSON text.
    ///
    /// # Errors
    ///
    /// [`EventValidationError::Malformed`] if `text` is not JSON, otherwise
    /// see [`EventValidator::validate_value`].
    pub fn validate_json(&self, text: &str) -> Result<(), EventValidationError> {
        let instance: Value = serde_json::from_str(text)
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;
        self.validate_value(&instance)
    }

    /// Validate a parsed event.
    ///
    /// # Errors
    ///
    /// - [`EventValidationError::Malformed`] without a string `context.type`.
    /// - [`EventValidationError::InvalidType`] if the type string is bad.
    /// - [`EventValidationError::UnknownEventType`] for an uncatalogued core type.
    /// - [`EventValidationError::Registry`] on schema violations, or when
    ///   `schemaUri` names an unregistered schema.
    /// - [`EventValidationError::InvalidContext`] on context invariants.
    pub fn validate_value(&self, instance: &Value) -> Result<(), EventValidationError> {
        let instance = without_blank_schema_uri(instance);
        let instance = instance.as_ref();

        let type_string = instance
            .pointer("/context/type")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                EventValidationError::Malformed("context.type must be a string".to_string())
            })?;
        let event_type = EventType::parse(type_string).map_err(EventValidationError::InvalidType)?;

        let schema_id = self.envelope_schema_id(&event_type)?;
        self.registry.validate_value(schema_id, instance)?;

        let event: Event = serde_json::from_value(instance.clone())
            .map_err(|e| EventValidationError::Malformed(e.to_string()))?;
        check_context(&event.context)?;

        if let Some(schema) = self.custom_schema(&event)? {
            schema.validate(instance)?;
        }

        tracing::trace!(event_type = %event_type, event_id = %event.context.id, "event validated");
        Ok(())
    }

    /// The schema named by the event's `schemaUri`.
    ///
    /// `Ok(None)` when `schemaUri` is absent or empty.
    ///
    /// # Errors
    ///
    /// [`RegistryError::NotFound`] when `schemaUri` is set but not
    /// registered.
    pub fn custom_schema(
        &self,
        event: &Event,
    ) -> Result<Option<Arc<RegisteredSchema>>, RegistryError> {
        match event.context.schema_uri() {
            None => Ok(None),
            Some(uri) => self.registry.lookup(uri).map(Some),
        }
    }

    fn envelope_schema_id(&self, event_type: &EventType) -> Result<&str, EventValidationError> {
        if event_type.is_custom() {
            return Ok(CUSTOM_EVENT_SCHEMA_ID);
        }
        self.catalog
            .schema_id_for(event_type)
            .ok_or_else(|| EventValidationError::UnknownEventType(event_type.to_string()))
    }
}

/// An empty or null `context.schemaUri` is the same as an absent one, but
/// the envelope schemas only accept a non-empty URI there.
fn without_blank_schema_uri(instance: &Value) -> Cow<'_, Value> {
    match instance.pointer("/context/schemaUri") {
        Some(Value::Null) => {}
        Some(Value::String(uri)) if uri.is_empty() => {}
        _ => return Cow::Borrowed(instance),
    }
    let mut owned = instance.clone();
    if let Some(context) = owned.get_mut("context").and_then(Value::as_object_mut) {
        context.remove("schemaUri");
    }
    Cow::Owned(owned)
}

fn check_context(context: &Context) -> Result<(), EventValidationError> {
    let spec_version = context
        .spec_version()
        .map_err(|e| EventValidationError::InvalidContext(e.to_string()))?;

    if !spec_version.supports_links() {
        let gated = [
            ("schemaUri", context.schema_uri().is_some()),
            ("chainId", context.chain_id.is_some()),
            ("links", context.links.is_some()),
        ];
        if let Some((field, _)) = gated.iter().find(|(_, present)| *present) {
            return Err(EventValidationError::InvalidContext(format!(
                "{field} requires specversion {LINKS_SPEC_VERSION} or later, got {spec_version}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdev_core::{
        EventBuilder, EventRef, FixedClock, FixedIdGenerator, Link, LinkType, Timestamp, Version,
    };
    use serde_json::json;

    const CUSTOM_CONTENT_ID: &str = "https://example.com/schema/mytool-resource-created";

    fn validator() -> EventValidator {
        EventValidator::with_builtin_schemas().unwrap()
    }

    fn build(builder: EventBuilder) -> Event {
        let clock = FixedClock(Timestamp::parse("2024-03-01T12:00:00Z").unwrap());
        builder
            .build(&FixedIdGenerator("event-1".to_string()), &clock)
            .unwrap()
    }

    fn pipelinerun_queued() -> EventBuilder {
        Event::builder(EventType::parse("dev.cdevents.pipelinerun.queued.0.2.0").unwrap())
            .source("/ci/pipelines")
            .subject_id("run-42")
            .subject_type("pipelineRun")
            .content_field("pipelineName", "deploy")
            .content_field("url", "https://ci.example.com/runs/42")
    }

    fn custom_event() -> EventBuilder {
        Event::builder(EventType::parse("dev.cdeventsx.mytool-resource.created.0.1.0").unwrap())
            .source("/mytool")
            .subject_id("res-1")
            .subject_type("resource")
            .content_field("user", "alice")
    }

    fn register_custom_content_schema(v: &EventValidator) {
        v.registry()
            .register_value(
                CUSTOM_CONTENT_ID,
                json!({
                    "$id": CUSTOM_CONTENT_ID,
                    "properties": {"subject": {"properties": {"content": {
                        "type": "object",
                        "required": ["user"],
                        "properties": {"user": {"type": "string", "minLength": 1}}
                    }}}}
                }),
            )
            .unwrap();
    }

    #[test]
    fn valid_core_event_passes() {
        validator().validate(&build(pipelinerun_queued())).unwrap();
    }

    #[test]
    fn core_event_with_unknown_content_field_fails() {
        let event = build(pipelinerun_queued().content_field("colour", "blue"));
        let err = validator().validate(&event).unwrap_err();
        match err {
            EventValidationError::Registry(RegistryError::ValidationFailed { id, violations }) => {
                assert_eq!(id, "https://cdevents.dev/0.4.1/schema/pipeline-run-queued-event");
                assert!(!violations.is_empty());
            }
            other => panic!("expected ValidationFailed, got {other}"),
        }
    }

    #[test]
    fn missing_required_content_fails() {
        let event = build(
            Event::builder(EventType::parse("dev.cdevents.artifact.packaged.0.2.0").unwrap())
                .source("/ci")
                .subject_id("pkg:oci/app@sha256:abc")
                .subject_type("artifact"),
        );
        let err = validator().validate(&event).unwrap_err();
        assert!(matches!(
            err,
            EventValidationError::Registry(RegistryError::ValidationFailed { .. })
        ));
    }

    #[test]
    fn wrong_version_of_known_type_reports_violation() {
        let mut value = build(pipelinerun_queued()).to_value().unwrap();
        value["context"]["type"] = json!("dev.cdevents.pipelinerun.queued.0.9.0");
        let err = validator().validate_value(&value).unwrap_err();
        assert!(matches!(err, EventValidationError::Registry(_)), "{err}");
    }

    #[test]
    fn unknown_core_type_is_distinct() {
        let event = build(
            Event::builder(EventType::parse("dev.cdevents.rocket.launched.0.1.0").unwrap())
                .source("/space")
                .subject_id("r-1")
                .subject_type("rocket"),
        );
        let err = validator().validate(&event).unwrap_err();
        match err {
            EventValidationError::UnknownEventType(t) => {
                assert_eq!(t, "dev.cdevents.rocket.launched.0.1.0")
            }
            other => panic!("expected UnknownEventType, got {other}"),
        }
    }

    #[test]
    fn invalid_type_string_is_rejected() {
        let mut value = build(pipelinerun_queued()).to_value().unwrap();
        value["context"]["type"] = json!("pipelinerun.queued");
        let err = validator().validate_value(&value).unwrap_err();
        assert!(matches!(err, EventValidationError::InvalidType(_)));
    }

    #[test]
    fn non_json_and_typeless_input_is_malformed() {
        let v = validator();
        assert!(matches!(
            v.validate_json("{nope").unwrap_err(),
            EventValidationError::Malformed(_)
        ));
        assert!(matches!(
            v.validate_json(r#"{"context": {}}"#).unwrap_err(),
            EventValidationError::Malformed(_)
        ));
    }

    #[test]
    fn validate_json_round_trips_builder_output() {
        let text = build(pipelinerun_queued()).to_json().unwrap();
        validator().validate_json(&text).unwrap();
    }

    #[test]
    fn custom_event_without_schema_uri_has_no_custom_schema() {
        let v = validator();
        let event = build(custom_event());
        assert!(v.custom_schema(&event).unwrap().is_none());
        v.validate(&event).unwrap();
    }

    #[test]
    fn empty_schema_uri_means_no_custom_schema() {
        let v = validator();
        let mut event = build(custom_event());
        event.context.schema_uri = Some(String::new());
        assert!(v.custom_schema(&event).unwrap().is_none());
    }

    #[test]
    fn empty_schema_uri_in_json_text_is_accepted() {
        let v = validator();
        for blank in [json!(""), Value::Null] {
            let mut value = build(pipelinerun_queued()).to_value().unwrap();
            value["context"]["schemaUri"] = blank;
            v.validate_json(&value.to_string()).unwrap();
            v.validate_value(&value).unwrap();

            let event = Event::from_json(&value.to_string()).unwrap();
            assert!(v.custom_schema(&event).unwrap().is_none());
        }
    }

    #[test]
    fn unregistered_schema_uri_is_not_found() {
        let v = validator();
        let event = build(custom_event().schema_uri(CUSTOM_CONTENT_ID));

        let lookup = v.custom_schema(&event).unwrap_err();
        assert_eq!(
            lookup.to_string(),
            format!("schema with id {CUSTOM_CONTENT_ID} could not be found")
        );

        let err = v.validate(&event).unwrap_err();
        assert!(err.is_schema_not_found(), "{err}");
    }

    #[test]
    fn registered_schema_uri_is_enforced() {
        let v = validator();
        register_custom_content_schema(&v);

        let good = build(custom_event().schema_uri(CUSTOM_CONTENT_ID));
        assert_eq!(
            v.custom_schema(&good).unwrap().unwrap().id(),
            CUSTOM_CONTENT_ID
        );
        v.validate(&good).unwrap();

        let bad = build(
            custom_event()
                .content(serde_json::Map::new())
                .schema_uri(CUSTOM_CONTENT_ID),
        );
        let err = v.validate(&bad).unwrap_err();
        match err {
            EventValidationError::Registry(RegistryError::ValidationFailed { id, .. }) => {
                assert_eq!(id, CUSTOM_CONTENT_ID)
            }
            other => panic!("expected ValidationFailed, got {other}"),
        }
    }

    #[test]
    fn custom_schema_violation_names_missing_property() {
        let v = validator();
        let id = "https://myorg.com/schema/custom";
        v.registry()
            .register_value(
                id,
                json!({
                    "$id": id,
                    "properties": {"subject": {"properties": {"content": {
                        "type": "object",
                        "required": ["user", "ticket"],
                        "properties": {
                            "user": {"type": "string"},
                            "ticket": {"type": "string"}
                        }
                    }}}}
                }),
            )
            .unwrap();

        let event = build(custom_event().schema_uri(id));
        let err = v.validate(&event).unwrap_err();
        assert!(err.to_string().contains("\"ticket\""), "{err}");
        match err {
            EventValidationError::Registry(RegistryError::ValidationFailed {
                id: failed,
                violations,
            }) => {
                assert_eq!(failed, id);
                assert_eq!(violations.len(), 1);
                let violation = &violations.as_slice()[0];
                assert_eq!(violation.instance_path, "/subject/content");
                assert!(violation.message.contains("ticket"), "{violation}");
            }
            other => panic!("expected ValidationFailed, got {other}"),
        }
    }

    #[test]
    fn schema_uri_applies_to_core_events_too() {
        let v = validator();
        v.registry()
            .register_value(
                "https://example.com/schema/strict-pipeline",
                json!({"properties": {"subject": {"properties": {"content": {
                    "required": ["url"]
                }}}}}),
            )
            .unwrap();
        let event = build(
            pipelinerun_queued()
                .content(serde_json::Map::new())
                .schema_uri("https://example.com/schema/strict-pipeline"),
        );
        assert!(v.validate(&event).is_err());
    }

    #[test]
    fn gated_fields_rejected_before_0_4_0() {
        let v = validator();
        let old = Version::new(0, 3, 0);

        v.validate(&build(pipelinerun_queued().spec_version(old)))
            .unwrap();

        for builder in [
            pipelinerun_queued().spec_version(old).chain_id("chain-1"),
            pipelinerun_queued()
                .spec_version(old)
                .schema_uri("https://example.com/schema/x"),
            pipelinerun_queued().spec_version(old).link(Link {
                link_type: LinkType::End,
                from: Some(EventRef {
                    context_id: "event-0".to_string(),
                }),
                to: None,
                link_kind: None,
                tags: None,
            }),
        ] {
            let err = v.validate(&build(builder)).unwrap_err();
            assert!(
                matches!(err, EventValidationError::InvalidContext(_)),
                "{err}"
            );
        }
    }

    #[test]
    fn gated_fields_accepted_from_0_4_0() {
        let event = build(
            pipelinerun_queued()
                .spec_version(Version::new(0, 4, 0))
                .chain_id("chain-1")
                .link(Link {
                    link_type: LinkType::Path,
                    from: Some(EventRef {
                        context_id: "event-0".to_string(),
                    }),
                    to: None,
                    link_kind: None,
                    tags: None,
                }),
        );
        validator().validate(&event).unwrap();
    }

    #[test]
    fn malformed_specversion_is_context_error() {
        let mut value = build(pipelinerun_queued()).to_value().unwrap();
        value["context"]["specversion"] = json!("v0.4");
        let err = validator().validate_value(&value).unwrap_err();
        assert!(matches!(err, EventValidationError::InvalidContext(_)), "{err}");
    }

    #[test]
    fn validator_is_shareable_across_threads() {
        let v = validator();
        register_custom_content_schema(&v);
        let event = build(custom_event().schema_uri(CUSTOM_CONTENT_ID));
        std::thread::scope(|scope| {
            for _ in 0..4 {
                let v = v.clone();
                let event = event.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        v.validate(&event).unwrap();
                    }
                });
            }
        });
    }
}

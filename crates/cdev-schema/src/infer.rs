//! # Type Inference
//!
//! Walks one [`SchemaDocument`] and produces the [`EventTypeDescriptor`]
//! the rendering stage consumes:
//!
//! 1. `context.type` must pin exactly one type string, which is parsed
//!    into the event's subject / predicate / version identity.
//! 2. `subject.type` must pin exactly one literal, the subject type tag.
//! 3. Each `subject.content` property becomes a [`ContentField`]. Its
//!    [`FieldKind`] is decided here, once, from the property's single
//!    declared type:
//!    - `"string"` -> [`FieldKind::ScalarString`]
//!    - `"object"` whose property set is exactly `{id, source}` ->
//!      [`FieldKind::Reference`]
//!    - any other `"object"` -> [`FieldKind::NestedObject`], minting a
//!      [`ContentType`] named `<Subject><Predicate>SubjectContent<Field>`
//!
//!    Nested objects may only hold string properties.
//!
//! Fields and content types are sorted by resolved name (ordinal, case
//! sensitive) so the descriptor is identical across runs whatever order
//! the schema declared its properties in.

use std::collections::{BTreeMap, BTreeSet};

use cdev_core::EventType;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::document::{
    escape_pointer_token, SchemaDocument, CONTEXT_TYPE_POINTER, SUBJECT_CONTENT_POINTER,
    SUBJECT_TYPE_POINTER,
};
use crate::error::CodegenError;
use crate::naming::NamingOverrides;

/// Name of the shared `{id, source}` shape.
pub const REFERENCE_TYPE_NAME: &str = "Reference";

/// Literal spliced between the event name and the field name of minted
/// nested types.
pub const SUBJECT_CONTENT_INFIX: &str = "SubjectContent";

/// Compiled identity and content shape of one event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTypeDescriptor {
    /// Full type string, e.g. `dev.cdevents.pipelinerun.queued.0.2.0`.
    #[serde(rename = "type")]
    pub type_string: String,
    /// Lower-case subject, e.g. `pipelinerun`.
    pub subject: String,
    /// Lower-case predicate, e.g. `queued`.
    pub predicate: String,
    /// Event type version, e.g. `0.2.0`.
    pub version: String,
    /// Custom discriminator for custom event types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    /// Resolved subject name, e.g. `PipelineRun`.
    pub subject_name: String,
    /// Resolved predicate name, e.g. `Queued`.
    pub predicate_name: String,
    /// The `subject.type` literal, e.g. `pipelineRun`.
    pub subject_type_tag: String,
    /// Content fields sorted by `name`.
    pub content_fields: Vec<ContentField>,
    /// Minted nested types sorted by `name`.
    pub content_types: Vec<ContentType>,
}

impl EventTypeDescriptor {
    /// Parse `type_string` back into an [`EventType`].
    pub fn event_type(&self) -> Result<EventType, cdev_core::CoreError> {
        EventType::parse(&self.type_string)
    }

    /// Whether any content field uses the shared [`REFERENCE_TYPE_NAME`] shape.
    pub fn uses_reference(&self) -> bool {
        self.content_fields
            .iter()
            .any(|f| f.kind == FieldKind::Reference)
    }
}

/// One property of an event's subject content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentField {
    /// Resolved target name, e.g. `PipelineName`.
    pub name: String,
    /// Property name as declared in the schema, e.g. `pipelineName`.
    pub raw_name: String,
    /// Structural kind.
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Whether the property is listed in the enclosing `required`.
    pub required: bool,
}

/// Structural kind of a [`ContentField`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldKind {
    /// A plain string.
    ScalarString,
    /// The shared `{id, source}` shape.
    Reference,
    /// A minted nested type.
    NestedObject {
        /// Name of the [`ContentType`] describing the object.
        #[serde(rename = "nestedTypeName")]
        type_name: String,
    },
}

impl FieldKind {
    /// The nested type name, set iff this is [`FieldKind::NestedObject`].
    pub fn nested_type_name(&self) -> Option<&str> {
        match self {
            FieldKind::NestedObject { type_name } => Some(type_name),
            _ => None,
        }
    }
}

/// A minted shape for a nested content object. Holds string fields only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentType {
    /// Namespaced type name.
    pub name: String,
    /// Fields sorted by `name`.
    pub fields: Vec<ContentField>,
}

/// Infer the descriptor for one event schema.
///
/// # Errors
///
/// Any schema structure violation, as a [`CodegenError`] carrying the
/// document location and the offending JSON Pointer.
pub fn infer(
    document: &SchemaDocument,
    overrides: &NamingOverrides,
) -> Result<EventTypeDescriptor, CodegenError> {
    let type_literal = document.single_enum_literal(CONTEXT_TYPE_POINTER)?;
    let event_type =
        EventType::parse(type_literal).map_err(|source| CodegenError::InvalidEventType {
            location: document.location().to_string(),
            pointer: CONTEXT_TYPE_POINTER.to_string(),
            source,
        })?;
    let subject_type_tag = document.single_enum_literal(SUBJECT_TYPE_POINTER)?;

    let subject_name = overrides.resolve(event_type.subject());
    let predicate_name = overrides.resolve(event_type.predicate());

    let content = document.object_at(SUBJECT_CONTENT_POINTER)?;
    let ctx = Walk {
        document,
        overrides,
    };

    let mut content_fields = Vec::new();
    let mut content_types = Vec::new();
    let mut claimed = BTreeMap::new();
    for (raw_name, property, pointer, required) in ctx.properties(content, SUBJECT_CONTENT_POINTER)? {
        let name = overrides.resolve(raw_name);
        ctx.claim_name(&mut claimed, &name, &pointer)?;
        let kind = match ctx.declared_type(property, &pointer)? {
            "string" => FieldKind::ScalarString,
            "object" => {
                let nested = ctx.nested_fields(property, &pointer)?;
                if is_reference_shape(property) {
                    FieldKind::Reference
                } else {
                    let type_name =
                        format!("{subject_name}{predicate_name}{SUBJECT_CONTENT_INFIX}{name}");
                    content_types.push(ContentType {
                        name: type_name.clone(),
                        fields: nested,
                    });
                    FieldKind::NestedObject { type_name }
                }
            }
            other => {
                return Err(CodegenError::UnsupportedType {
                    location: document.location().to_string(),
                    pointer,
                    found: other.to_string(),
                })
            }
        };
        content_fields.push(ContentField {
            name,
            raw_name: raw_name.to_string(),
            kind,
            required,
        });
    }

    sort_fields(&mut content_fields);
    content_types.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(EventTypeDescriptor {
        type_string: event_type.to_string(),
        subject: event_type.subject().to_string(),
        predicate: event_type.predicate().to_string(),
        version: event_type.version().to_string(),
        custom: event_type.custom_name().map(str::to_string),
        subject_name,
        predicate_name,
        subject_type_tag: subject_type_tag.to_string(),
        content_fields,
        content_types,
    })
}

/// `{id, source}` and nothing else, in any declaration order.
fn is_reference_shape(object_schema: &Value) -> bool {
    object_schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|props| {
            props.len() == 2 && props.contains_key("id") && props.contains_key("source")
        })
}

fn sort_fields(fields: &mut [ContentField]) {
    fields.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then_with(|| a.raw_name.cmp(&b.raw_name))
    });
}

struct Walk<'a> {
    document: &'a SchemaDocument,
    overrides: &'a NamingOverrides,
}

impl<'a> Walk<'a> {
    /// `(raw name, property schema, pointer, required)` for each declared
    /// property of the object schema at `pointer`, in raw-name order.
    fn properties<'v>(
        &self,
        object: &'v Map<String, Value>,
        pointer: &str,
    ) -> Result<Vec<(&'v str, &'v Value, String, bool)>, CodegenError> {
        let required = self.required_set(object, pointer)?;
        let properties = match object.get("properties") {
            None => return Ok(Vec::new()),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(self.malformed(
                    format!("{pointer}/properties"),
                    "properties must be an object",
                ))
            }
        };

        let mut entries: Vec<_> = properties.iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(entries
            .into_iter()
            .map(|(raw_name, property)| {
                let property_pointer =
                    format!("{pointer}/properties/{}", escape_pointer_token(raw_name));
                (
                    raw_name.as_str(),
                    property,
                    property_pointer,
                    required.contains(raw_name.as_str()),
                )
            })
            .collect())
    }

    fn required_set<'v>(
        &self,
        object: &'v Map<String, Value>,
        pointer: &str,
    ) -> Result<BTreeSet<&'v str>, CodegenError> {
        let Some(required) = object.get("required") else {
            return Ok(BTreeSet::new());
        };
        required
            .as_array()
            .and_then(|items| items.iter().map(Value::as_str).collect::<Option<BTreeSet<_>>>())
            .ok_or_else(|| {
                self.malformed(
                    format!("{pointer}/required"),
                    "required must be an array of strings",
                )
            })
    }

    /// The single primitive type a property declares.
    fn declared_type<'v>(&self, property: &'v Value, pointer: &str) -> Result<&'v str, CodegenError> {
        let cardinality = |count| CodegenError::TypeCardinality {
            location: self.document.location().to_string(),
            pointer: pointer.to_string(),
            count,
        };
        match property.get("type") {
            None => Err(cardinality(0)),
            Some(Value::String(t)) => Ok(t),
            Some(Value::Array(types)) if types.len() == 1 => types[0]
                .as_str()
                .ok_or_else(|| self.malformed(format!("{pointer}/type"), "type must be a string")),
            Some(Value::Array(types)) => Err(cardinality(types.len())),
            Some(_) => Err(self.malformed(
                format!("{pointer}/type"),
                "type must be a string or an array of strings",
            )),
        }
    }

    /// Fields of a nested content object; every property must be a string.
    fn nested_fields(
        &self,
        object_schema: &Value,
        pointer: &str,
    ) -> Result<Vec<ContentField>, CodegenError> {
        let object = object_schema
            .as_object()
            .ok_or_else(|| self.malformed(pointer.to_string(), "property schema must be an object"))?;

        let mut fields = Vec::new();
        let mut claimed = BTreeMap::new();
        for (raw_name, property, property_pointer, required) in self.properties(object, pointer)? {
            let name = self.overrides.resolve(raw_name);
            self.claim_name(&mut claimed, &name, &property_pointer)?;
            match self.declared_type(property, &property_pointer)? {
                "string" => fields.push(ContentField {
                    name,
                    raw_name: raw_name.to_string(),
                    kind: FieldKind::ScalarString,
                    required,
                }),
                "object" => {
                    return Err(CodegenError::NestedTooDeep {
                        location: self.document.location().to_string(),
                        pointer: property_pointer,
                    })
                }
                other => {
                    return Err(CodegenError::UnsupportedType {
                        location: self.document.location().to_string(),
                        pointer: property_pointer,
                        found: other.to_string(),
                    })
                }
            }
        }
        sort_fields(&mut fields);
        Ok(fields)
    }

    /// Record that `pointer` resolves to `name` within one object.
    fn claim_name(
        &self,
        claimed: &mut BTreeMap<String, String>,
        name: &str,
        pointer: &str,
    ) -> Result<(), CodegenError> {
        match claimed.get(name) {
            Some(first) => Err(CodegenError::NameCollision {
                location: self.document.location().to_string(),
                name: name.to_string(),
                first: first.clone(),
                second: pointer.to_string(),
            }),
            None => {
                claimed.insert(name.to_string(), pointer.to_string());
                Ok(())
            }
        }
    }

    fn malformed(&self, pointer: String, reason: &str) -> CodegenError {
        CodegenError::Malformed {
            location: self.document.location().to_string(),
            pointer,
            reason: reason.to_string(),
        }
    }
}

//! # Schema Document Model
//!
//! A parsed event schema, checked against the JSON Schema metaschema and
//! exposing the handful of nested nodes the type compiler reads:
//!
//! - `/properties/context/properties/type`: the pinned event type string
//! - `/properties/subject/properties/type`: the pinned subject type tag
//! - `/properties/subject/properties/content`: the content object
//!
//! Lookups fail with a [`CodegenError`] naming the document location and
//! the JSON Pointer that was expected.

use serde_json::{Map, Value};

use crate::error::CodegenError;
use crate::registry::{build_validator, LocalSchemaRetriever};

/// Pointer to the `context.type` property schema.
pub const CONTEXT_TYPE_POINTER: &str = "/properties/context/properties/type";

/// Pointer to the `subject.type` property schema.
pub const SUBJECT_TYPE_POINTER: &str = "/properties/subject/properties/type";

/// Pointer to the `subject.content` property schema.
pub const SUBJECT_CONTENT_POINTER: &str = "/properties/subject/properties/content";

/// One parsed JSON Schema file.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    location: String,
    value: Value,
}

impl SchemaDocument {
    /// Parse schema text. `location` labels errors (usually the file path).
    ///
    /// # Errors
    ///
    /// [`CodegenError::InvalidJson`] if the text is not JSON,
    /// [`CodegenError::InvalidSchema`] if it is not a valid JSON Schema.
    pub fn parse(location: impl Into<String>, text: &str) -> Result<Self, CodegenError> {
        Self::parse_with(location, text, LocalSchemaRetriever::default())
    }

    /// Parse schema text whose `$ref`s resolve through `refs`.
    pub(crate) fn parse_with(
        location: impl Into<String>,
        text: &str,
        refs: LocalSchemaRetriever,
    ) -> Result<Self, CodegenError> {
        let location = location.into();
        let value: Value = serde_json::from_str(text).map_err(|e| CodegenError::InvalidJson {
            location: location.clone(),
            reason: e.to_string(),
        })?;
        Self::from_value_with(location, value, refs)
    }

    /// Wrap an already-parsed schema value.
    ///
    /// # Errors
    ///
    /// [`CodegenError::InvalidSchema`] if the value is not an object or
    /// does not compile as a Draft 2020-12 schema. A `$ref` to another
    /// document cannot resolve here; see [`crate::compile_schemas`].
    pub fn from_value(location: impl Into<String>, value: Value) -> Result<Self, CodegenError> {
        Self::from_value_with(location, value, LocalSchemaRetriever::default())
    }

    pub(crate) fn from_value_with(
        location: impl Into<String>,
        value: Value,
        refs: LocalSchemaRetriever,
    ) -> Result<Self, CodegenError> {
        let location = location.into();
        if !value.is_object() {
            return Err(CodegenError::InvalidSchema {
                location,
                reason: "event schema must be a JSON object".to_string(),
            });
        }
        build_validator(&value, refs).map_err(|reason| {
            CodegenError::InvalidSchema {
                location: location.clone(),
                reason,
            }
        })?;
        Ok(Self { location, value })
    }

    /// The label errors are reported against.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The raw schema value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The schema's `$id`, if declared.
    pub fn id(&self) -> Option<&str> {
        self.value.get("$id").and_then(Value::as_str)
    }

    /// Whitespace-free JSON text of the schema. See [`compact_json`].
    pub fn compact(&self) -> String {
        compact_json(&self.value)
    }

    /// The object node at `pointer`.
    ///
    /// # Errors
    ///
    /// [`CodegenError::MissingProperty`] if the node is absent or not an object.
    pub fn object_at(&self, pointer: &str) -> Result<&Map<String, Value>, CodegenError> {
        self.value
            .pointer(pointer)
            .and_then(Value::as_object)
            .ok_or_else(|| CodegenError::MissingProperty {
                location: self.location.clone(),
                pointer: pointer.to_string(),
            })
    }

    /// The single string literal pinned by the `enum` of the property at
    /// `pointer`.
    ///
    /// # Errors
    ///
    /// - [`CodegenError::MissingProperty`] if the property or its `enum`
    ///   is absent.
    /// - [`CodegenError::EnumCardinality`] if the enum does not hold
    ///   exactly one value.
    /// - [`CodegenError::InvalidEnumValue`] if that value is not a
    ///   non-empty string.
    pub fn single_enum_literal(&self, pointer: &str) -> Result<&str, CodegenError> {
        let property = self.object_at(pointer)?;
        let values = property
            .get("enum")
            .and_then(Value::as_array)
            .ok_or_else(|| CodegenError::MissingProperty {
                location: self.location.clone(),
                pointer: format!("{pointer}/enum"),
            })?;

        if values.len() != 1 {
            return Err(CodegenError::EnumCardinality {
                location: self.location.clone(),
                pointer: pointer.to_string(),
                count: values.len(),
            });
        }

        match values[0].as_str() {
            Some(literal) if !literal.is_empty() => Ok(literal),
            _ => Err(CodegenError::InvalidEnumValue {
                location: self.location.clone(),
                pointer: pointer.to_string(),
            }),
        }
    }
}

/// Escape a property name for use as a JSON Pointer reference token.
pub(crate) fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Whitespace-free JSON text with object keys sorted at every level.
///
/// Source key order is not preserved: two schemas that differ only in
/// formatting or key order compact to the same text, whichever map
/// ordering `serde_json` was built with.
pub fn compact_json(value: &Value) -> String {
    let mut out = String::new();
    write_compact(value, &mut out);
    out
}

fn write_compact(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // A JSON string's serialized form is its quoted, escaped text.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_compact(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_compact(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

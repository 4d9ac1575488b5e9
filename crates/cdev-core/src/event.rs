//! # Event Instance Model
//!
//! The wire form of a CDEvents event:
//!
//! ```json
//! {
//!   "context": {
//!     "specversion": "0.4.1",
//!     "id": "271069a8-fc18-44f1-b38f-9d70a1695819",
//!     "source": "/event/source/123",
//!     "type": "dev.cdevents.pipelinerun.queued.0.2.0",
//!     "timestamp": "2023-03-20T14:27:05.315Z"
//!   },
//!   "subject": {
//!     "id": "mySubject123",
//!     "source": "/event/source/123",
//!     "type": "pipelineRun",
//!     "content": { "pipelineName": "myPipeline", "url": "https://example.com/myPipeline" }
//!   }
//! }
//! ```
//!
//! `context.schemaUri`, `context.chainId`, and `context.links` exist from
//! spec 0.4.0 onward. The model keeps `context.type` and
//! `context.specversion` as the raw wire strings so that a malformed value
//! survives parsing and is reported by validation, not by serde.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;
use crate::event_type::EventType;
use crate::identity::IdGenerator;
use crate::temporal::{Clock, Timestamp};
use crate::version::{Version, SPEC_VERSION};

/// A CDEvents event instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Envelope metadata.
    pub context: Context,
    /// The entity the event is about.
    pub subject: Subject,
    /// Opaque producer data, either a JSON value or a base64 string.
    #[serde(rename = "customData", default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<Value>,
    /// Media type of `customData`.
    #[serde(
        rename = "customDataContentType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub custom_data_content_type: Option<String>,
}

/// The `context` block of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Spec revision the event was produced against, e.g. `0.4.1`.
    #[serde(rename = "specversion")]
    pub spec_version: String,
    /// Producer-unique event id.
    pub id: String,
    /// URI-reference of the producer.
    pub source: String,
    /// Full event type string.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the occurrence happened.
    pub timestamp: Timestamp,
    /// Id of an additional schema the event must conform to.
    #[serde(rename = "schemaUri", default, skip_serializing_if = "is_blank")]
    pub schema_uri: Option<String>,
    /// Correlates the events of one causal chain.
    #[serde(rename = "chainId", default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Links to related events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

impl Context {
    /// Parse the declared event type.
    pub fn event_type(&self) -> Result<EventType, CoreError> {
        EventType::parse(&self.event_type)
    }

    /// Parse the declared spec version.
    pub fn spec_version(&self) -> Result<Version, CoreError> {
        Version::parse(&self.spec_version)
    }

    /// The custom schema id, treating an empty string as absent.
    pub fn schema_uri(&self) -> Option<&str> {
        self.schema_uri.as_deref().filter(|uri| !uri.is_empty())
    }
}

/// The `subject` block of an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Id of the subject within its source.
    pub id: String,
    /// Source of the subject, when it differs from `context.source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Subject type tag fixed by the event type, e.g. `pipelineRun`.
    #[serde(rename = "type")]
    pub subject_type: String,
    /// Event-type-specific payload.
    #[serde(default = "empty_object")]
    pub content: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A link from this event to another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Shape of the link.
    #[serde(rename = "linkType")]
    pub link_type: LinkType,
    /// Upstream event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EventRef>,
    /// Downstream event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<EventRef>,
    /// Free-form relation name for `RELATION` links.
    #[serde(rename = "linkKind", default, skip_serializing_if = "Option::is_none")]
    pub link_kind: Option<String>,
    /// Arbitrary string tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
}

/// The shape of a [`Link`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkType {
    /// Causal predecessor in the same chain.
    Path,
    /// Terminal link closing a chain.
    End,
    /// Non-causal relation.
    Relation,
}

/// Points at another event by its `context.id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    /// The referenced event's id.
    #[serde(rename = "contextId")]
    pub context_id: String,
}

impl Event {
    /// Start building an event of the given type.
    pub fn builder(event_type: EventType) -> EventBuilder {
        EventBuilder::new(event_type)
    }

    /// Parse an event from JSON text.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Compact JSON text.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Indented JSON text.
    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The event as a JSON value, the form schema validation operates on.
    pub fn to_value(&self) -> Result<Value, CoreError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Step-wise construction of an [`Event`].
///
/// Ids and timestamps are drawn from the collaborators passed to
/// [`EventBuilder::build`], never from ambient state.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event_type: EventType,
    spec_version: Version,
    source: Option<String>,
    subject_id: Option<String>,
    subject_source: Option<String>,
    subject_type: Option<String>,
    content: Map<String, Value>,
    custom_data: Option<Value>,
    custom_data_content_type: Option<String>,
    schema_uri: Option<String>,
    chain_id: Option<String>,
    links: Vec<Link>,
}

impl EventBuilder {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            spec_version: SPEC_VERSION,
            source: None,
            subject_id: None,
            subject_source: None,
            subject_type: None,
            content: Map::new(),
            custom_data: None,
            custom_data_content_type: None,
            schema_uri: None,
            chain_id: None,
            links: Vec::new(),
        }
    }

    /// Override the spec version (defaults to [`SPEC_VERSION`]).
    pub fn spec_version(mut self, version: Version) -> Self {
        self.spec_version = version;
        self
    }

    /// `context.source`.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// `subject.id`.
    pub fn subject_id(mut self, id: impl Into<String>) -> Self {
        self.subject_id = Some(id.into());
        self
    }

    /// `subject.source`.
    pub fn subject_source(mut self, source: impl Into<String>) -> Self {
        self.subject_source = Some(source.into());
        self
    }

    /// `subject.type`, e.g. `pipelineRun`.
    pub fn subject_type(mut self, tag: impl Into<String>) -> Self {
        self.subject_type = Some(tag.into());
        self
    }

    /// Set one `subject.content` field.
    pub fn content_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content.insert(name.into(), value.into());
        self
    }

    /// Replace `subject.content` wholesale.
    pub fn content(mut self, content: Map<String, Value>) -> Self {
        self.content = content;
        self
    }

    /// `customData` and its content type.
    pub fn custom_data(mut self, data: Value, content_type: impl Into<String>) -> Self {
        self.custom_data = Some(data);
        self.custom_data_content_type = Some(content_type.into());
        self
    }

    /// `context.schemaUri`.
    pub fn schema_uri(mut self, uri: impl Into<String>) -> Self {
        self.schema_uri = Some(uri.into());
        self
    }

    /// `context.chainId`.
    pub fn chain_id(mut self, chain_id: impl Into<String>) -> Self {
        self.chain_id = Some(chain_id.into());
        self
    }

    /// Append to `context.links`.
    pub fn link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Finish the event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] if `source`, `subject.id`, or
    /// `subject.type` was never set.
    pub fn build(self, ids: &dyn IdGenerator, clock: &dyn Clock) -> Result<Event, CoreError> {
        let source = self.source.ok_or(CoreError::MissingField("context.source"))?;
        let subject_id = self.subject_id.ok_or(CoreError::MissingField("subject.id"))?;
        let subject_type = self
            .subject_type
            .ok_or(CoreError::MissingField("subject.type"))?;

        Ok(Event {
            context: Context {
                spec_version: self.spec_version.to_string(),
                id: ids.next_id(),
                source,
                event_type: self.event_type.to_string(),
                timestamp: clock.now(),
                schema_uri: self.schema_uri,
                chain_id: self.chain_id,
                links: if self.links.is_empty() {
                    None
                } else {
                    Some(self.links)
                },
            },
            subject: Subject {
                id: subject_id,
                source: self.subject_source,
                subject_type,
                content: Value::Object(self.content),
            },
            custom_data: self.custom_data,
            custom_data_content_type: self.custom_data_content_type,
        })
    }
}

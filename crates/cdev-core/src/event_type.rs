//! # Event Type Identity
//!
//! Every CDEvents event declares its type in `context.type` as a dotted,
//! reverse-DNS-like string:
//!
//! ```text
//! dev.cdevents.<subject>.<predicate>.<MAJOR>.<MINOR>.<PATCH>
//! dev.cdeventsx.<custom>-<subject>.<predicate>.<MAJOR>.<MINOR>.<PATCH>
//! ```
//!
//! The first form names a core event, validated against
//! a built-in schema. The second names a custom event owned by an external
//! tool (`<custom>`), validated against a schema registered at runtime.
//!
//! Subject and predicate are canonicalised to lower case on parse, so
//! `dev.cdevents.pipelineRun.queued.0.2.0` and
//! `dev.cdevents.pipelinerun.queued.0.2.0` name the same type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;
use crate::version::Version;

/// Type-string prefix for core events.
pub const CDEVENTS_TYPE_ROOT: &str = "dev.cdevents";

/// Type-string prefix for custom events.
pub const CDEVENTS_CUSTOM_TYPE_ROOT: &str = "dev.cdeventsx";

/// The `{subject, predicate, version, custom?}` identity of an event type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventType {
    subject: String,
    predicate: String,
    version: Version,
    custom: Option<String>,
}

impl EventType {
    /// A core event type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEventType`] if `subject` or `predicate`
    /// is empty or contains characters other than ASCII alphanumerics.
    pub fn new(subject: &str, predicate: &str, version: Version) -> Result<Self, CoreError> {
        let display = format!("{CDEVENTS_TYPE_ROOT}.{subject}.{predicate}.{version}");
        check_token(&display, "subject", subject)?;
        check_token(&display, "predicate", predicate)?;
        Ok(Self {
            subject: subject.to_ascii_lowercase(),
            predicate: predicate.to_ascii_lowercase(),
            version,
            custom: None,
        })
    }

    /// A custom event type owned by the tool named `custom`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEventType`] if any token is empty or
    /// contains characters other than ASCII alphanumerics.
    pub fn custom(
        custom: &str,
        subject: &str,
        predicate: &str,
        version: Version,
    ) -> Result<Self, CoreError> {
        let display =
            format!("{CDEVENTS_CUSTOM_TYPE_ROOT}.{custom}-{subject}.{predicate}.{version}");
        check_token(&display, "custom", custom)?;
        check_token(&display, "subject", subject)?;
        check_token(&display, "predicate", predicate)?;
        Ok(Self {
            subject: subject.to_ascii_lowercase(),
            predicate: predicate.to_ascii_lowercase(),
            version,
            custom: Some(custom.to_string()),
        })
    }

    /// Parse a full type string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEventType`] when the prefix is unknown,
    /// the string has the wrong number of segments, a token is malformed,
    /// or [`CoreError::InvalidVersion`] when the version suffix is not semver.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidEventType {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 7 {
            return Err(invalid(
                "expected <root>.<subject>.<predicate>.<MAJOR>.<MINOR>.<PATCH>",
            ));
        }

        let root = format!("{}.{}", parts[0], parts[1]);
        let version = Version::parse(&parts[4..].join("."))?;

        match root.as_str() {
            CDEVENTS_TYPE_ROOT => Self::new(parts[2], parts[3], version),
            CDEVENTS_CUSTOM_TYPE_ROOT => {
                let (custom, subject) = parts[2]
                    .split_once('-')
                    .ok_or_else(|| invalid("custom types must use <custom>-<subject>"))?;
                Self::custom(custom, subject, parts[3], version)
            }
            _ => Err(invalid(&format!(
                "unknown root {root:?}, expected {CDEVENTS_TYPE_ROOT:?} or {CDEVENTS_CUSTOM_TYPE_ROOT:?}"
            ))),
        }
    }

    /// Lower-case subject, e.g. `pipelinerun`.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Lower-case predicate, e.g. `queued`.
    pub fn predicate(&self) -> &str {
        &self.predicate
    }

    /// Version of the event type (not `context.specversion`).
    pub fn version(&self) -> Version {
        self.version
    }

    /// The custom discriminator, if this is a custom event type.
    pub fn custom_name(&self) -> Option<&str> {
        self.custom.as_deref()
    }

    /// Whether this type is validated against a dynamically registered schema.
    pub fn is_custom(&self) -> bool {
        self.custom.is_some()
    }

    /// `subject.predicate`, or `custom-subject.predicate` for custom types.
    pub fn short(&self) -> String {
        match &self.custom {
            Some(custom) => format!("{custom}-{}.{}", self.subject, self.predicate),
            None => format!("{}.{}", self.subject, self.predicate),
        }
    }

    /// The full type string without its version suffix.
    pub fn unversioned(&self) -> String {
        format!("{}.{}", self.root(), self.short())
    }

    fn root(&self) -> &'static str {
        if self.custom.is_some() {
            CDEVENTS_CUSTOM_TYPE_ROOT
        } else {
            CDEVENTS_TYPE_ROOT
        }
    }
}

fn check_token(display: &str, what: &str, token: &str) -> Result<(), CoreError> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(CoreError::InvalidEventType {
            value: display.to_string(),
            reason: format!("{what} must be a non-empty ASCII alphanumeric token, got {token:?}"),
        });
    }
    Ok(())
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.unversioned(), self.version)
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

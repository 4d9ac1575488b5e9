//! # Error Types
//!
//! Errors raised while parsing the primitive CDEvents identifiers: event
//! type strings, semantic versions, and timestamps. Higher layers (schema
//! compilation, registry, validation) wrap [`CoreError`] in their own
//! error enums rather than stringifying it.

use thiserror::Error;

/// Error parsing or constructing a core CDEvents primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The event type string does not follow the
    /// `dev.cdevents.<subject>.<predicate>.<version>` grammar.
    #[error("invalid event type {value:?}: {reason}")]
    InvalidEventType {
        /// The offending type string.
        value: String,
        /// What part of the grammar was violated.
        reason: String,
    },

    /// A version string is not `MAJOR.MINOR.PATCH`.
    #[error("invalid version {value:?}: {reason}")]
    InvalidVersion {
        /// The offending version string.
        value: String,
        /// What part of the grammar was violated.
        reason: String,
    },

    /// A timestamp is not a valid RFC 3339 instant.
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp {
        /// The offending timestamp string.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },

    /// A required event field was left unset when building an event.
    #[error("missing event field: {0}")]
    MissingField(&'static str),

    /// Event (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

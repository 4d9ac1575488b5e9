//! # cdev-core: Foundational Types for CDEvents
//!
//! The leaf crate of the workspace. It defines the identity and instance
//! model every other crate builds on:
//!
//! - [`EventType`]: the `{subject, predicate, version, custom?}` identity
//!   of an event class and its dotted type-string grammar.
//! - [`Version`]: `MAJOR.MINOR.PATCH` versions for event types and spec
//!   revisions, including the gate for `schemaUri` / `chainId` / `links`.
//! - [`Event`]: the wire model of an event instance, with an
//!   [`EventBuilder`] that takes its ids and timestamps from injected
//!   [`IdGenerator`] and [`Clock`] implementations.
//! - [`Timestamp`]: UTC-only timestamps with millisecond precision.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `cdev-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod event;
pub mod event_type;
pub mod identity;
pub mod temporal;
pub mod version;

// Re-export primary types for ergonomic imports.
pub use error::CoreError;
pub use event::{Context, Event, EventBuilder, EventRef, Link, LinkType, Subject};
pub use event_type::{EventType, CDEVENTS_CUSTOM_TYPE_ROOT, CDEVENTS_TYPE_ROOT};
pub use identity::{FixedIdGenerator, IdGenerator, SequentialIdGenerator, UuidV4Generator};
pub use temporal::{Clock, FixedClock, SystemClock, Timestamp};
pub use version::{SpecVersion, Version, LINKS_SPEC_VERSION, SPEC_VERSION};

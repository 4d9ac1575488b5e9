//! # Semantic Versions
//!
//! CDEvents uses plain `MAJOR.MINOR.PATCH` versions in two places: the
//! version suffix of every event type string (`...queued.0.2.0`) and the
//! `context.specversion` field naming the spec revision an event was
//! produced against.
//!
//! Pre-release and build metadata suffixes are not part of the CDEvents
//! grammar and are rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A `MAJOR.MINOR.PATCH` version.
///
/// Ordering is numeric per component, so `0.10.0 > 0.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Patch component.
    pub patch: u64,
}

/// Version of the CDEvents specification an event was produced against.
pub type SpecVersion = Version;

/// The spec revision this crate produces events for.
pub const SPEC_VERSION: SpecVersion = Version::new(0, 4, 1);

/// First spec revision carrying `schemaUri`, `chainId`, and `links`.
pub const LINKS_SPEC_VERSION: SpecVersion = Version::new(0, 4, 0);

impl Version {
    /// Build a version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a `MAJOR.MINOR.PATCH` string.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidVersion`] if the string does not have
    /// exactly three dot-separated numeric components, or if a component
    /// has a leading zero.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidVersion {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid("expected MAJOR.MINOR.PATCH"));
        }

        let mut components = [0u64; 3];
        for (slot, part) in components.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid("components must be non-empty decimal numbers"));
            }
            if part.len() > 1 && part.starts_with('0') {
                return Err(invalid("components must not have leading zeros"));
            }
            *slot = part
                .parse()
                .map_err(|_| invalid("component out of range"))?;
        }

        Ok(Self::new(components[0], components[1], components[2]))
    }

    /// Whether an event produced against this spec revision may carry
    /// `schemaUri`, `chainId`, and `links`.
    pub fn supports_links(&self) -> bool {
        *self >= LINKS_SPEC_VERSION
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_semver() {
        let v = Version::parse("0.4.1").unwrap();
        assert_eq!(v, Version::new(0, 4, 1));
        assert_eq!(v.to_string(), "0.4.1");
    }

    #[test]
    fn rejects_wrong_component_count() {
        assert!(Version::parse("0.4").is_err());
        assert!(Version::parse("0.4.1.2").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn rejects_non_numeric_and_prerelease() {
        assert!(Version::parse("0.4.x").is_err());
        assert!(Version::parse("0.4.1-draft").is_err());
        assert!(Version::parse("v0.4.1").is_err());
    }

    #[test]
    fn rejects_leading_zeros() {
        let err = Version::parse("0.04.1").unwrap_err();
        assert!(err.to_string().contains("leading zeros"), "{err}");
    }

    #[test]
    fn orders_numerically() {
        assert!(Version::parse("0.10.0").unwrap() > Version::parse("0.9.0").unwrap());
    }

    #[test]
    fn links_gate() {
        assert!(!Version::new(0, 3, 0).supports_links());
        assert!(Version::new(0, 4, 0).supports_links());
        assert!(SPEC_VERSION.supports_links());
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&Version::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"1.2.3\"");
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Version::new(1, 2, 3));
        assert!(serde_json::from_str::<Version>("\"1.2\"").is_err());
    }
}

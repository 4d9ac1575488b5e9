//! # Naming Resolver
//!
//! Maps raw schema tokens (subjects, predicates, content property names)
//! to target type and field names.
//!
//! The default rule upper-cases the first character and leaves the rest
//! untouched: `pipelineName` becomes `PipelineName`, `pipelinerun` becomes
//! `Pipelinerun`. It is deliberately not word-boundary title casing.
//! Names already published for existing event types depend on it.
//!
//! Subjects such as `pipelinerun` were flattened to lower case in the type
//! grammar, so their word boundaries cannot be recovered from case alone.
//! The override table restores them (`pipelinerun` -> `PipelineRun`).
//! Lookups are case-insensitive on the raw token.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Overrides applied by [`NamingOverrides::builtin`].
pub const DEFAULT_OVERRIDES: &[(&str, &str)] = &[
    ("pipelinerun", "PipelineRun"),
    ("sourcechange", "SourceChange"),
    ("taskrun", "TaskRun"),
    ("testcaserun", "TestCaseRun"),
    ("testoutput", "TestOutput"),
    ("testsuiterun", "TestSuiteRun"),
];

/// Raw token -> target name table. Keys are stored lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct NamingOverrides {
    table: BTreeMap<String, String>,
}

impl NamingOverrides {
    /// An empty table: every name goes through the default rule.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table of known compound nouns from [`DEFAULT_OVERRIDES`].
    pub fn builtin() -> Self {
        DEFAULT_OVERRIDES.iter().copied().collect()
    }

    /// Add or replace one override.
    pub fn insert(&mut self, raw: &str, target: impl Into<String>) {
        self.table.insert(raw.to_lowercase(), target.into());
    }

    /// Layer `other` on top of this table; `other` wins on conflicts.
    pub fn merge(&mut self, other: &NamingOverrides) {
        for (raw, target) in &other.table {
            self.table.insert(raw.clone(), target.clone());
        }
    }

    /// The override for `raw`, if any.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.table.get(&raw.to_lowercase()).map(String::as_str)
    }

    /// Resolve `raw` to its target name.
    pub fn resolve(&self, raw: &str) -> String {
        resolve_name(raw, self)
    }

    /// Number of overrides.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Overrides in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for NamingOverrides {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut overrides = Self::new();
        for (raw, target) in iter {
            overrides.insert(raw.as_ref(), target);
        }
        overrides
    }
}

impl From<BTreeMap<String, String>> for NamingOverrides {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<NamingOverrides> for BTreeMap<String, String> {
    fn from(overrides: NamingOverrides) -> Self {
        overrides.table
    }
}

/// Resolve a raw schema token: the override if one exists, otherwise the
/// token with its first character upper-cased.
pub fn resolve_name(raw: &str, overrides: &NamingOverrides) -> String {
    match overrides.get(raw) {
        Some(target) => target.to_string(),
        None => capitalize_first(raw),
    }
}

/// Upper-case the first character of `raw`, leaving the rest unchanged.
pub fn capitalize_first(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

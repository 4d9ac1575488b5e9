//! # Event Identity Providers
//!
//! `context.id` must be unique per producer. Event construction draws ids
//! from an injected [`IdGenerator`]: [`UuidV4Generator`] in production,
//! [`FixedIdGenerator`] or [`SequentialIdGenerator`] when output has to be
//! reproducible.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of event ids.
pub trait IdGenerator: Send + Sync {
    /// Produce the next id.
    fn next_id(&self) -> String;
}

/// Random UUID v4 ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV4Generator;

impl IdGenerator for UuidV4Generator {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Always returns the same id.
#[derive(Debug, Clone)]
pub struct FixedIdGenerator(pub String);

impl IdGenerator for FixedIdGenerator {
    fn next_id(&self) -> String {
        self.0.clone()
    }
}

/// Returns `<prefix>-1`, `<prefix>-2`, ... in call order.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start a new sequence.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_ids_are_distinct() {
        let g = UuidV4Generator;
        let a = g.next_id();
        let b = g.next_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn fixed_ids_repeat() {
        let g = FixedIdGenerator("271069a8-fc18-44f1-b38f-9d70a1695819".to_string());
        assert_eq!(g.next_id(), g.next_id());
    }

    #[test]
    fn sequential_ids_count_up() {
        let g = SequentialIdGenerator::new("evt");
        assert_eq!(g.next_id(), "evt-1");
        assert_eq!(g.next_id(), "evt-2");
    }
}

//! Synchronous hooks that can veto region mutations.
//!
//! A [`CacheWriter`] is consulted before an entry is created, updated or
//! destroyed and before a region is cleared. Returning `false` vetoes the
//! operation; the region then fails with `Error::CacheWriterVetoed` and is left
//! unchanged.

use std::fmt;

/// Kind of entry mutation a writer is asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOperation {
    Create,
    Update,
    Destroy,
}

impl fmt::Display for EntryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryOperation::Create => write!(f, "create"),
            EntryOperation::Update => write!(f, "update"),
            EntryOperation::Destroy => write!(f, "destroy"),
        }
    }
}

/// A pending entry mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryEvent {
    pub region: String,
    /// Entry key in its `Display` form.
    pub key: String,
    pub operation: EntryOperation,
}

impl EntryEvent {
    pub fn new(region: &str, key: impl ToString, operation: EntryOperation) -> Self {
        EntryEvent {
            region: region.to_string(),
            key: key.to_string(),
            operation,
        }
    }
}

/// Veto hooks for region mutations. Every hook allows the operation by default.
pub trait CacheWriter: Send + Sync {
    fn before_create(&self, _event: &EntryEvent) -> bool {
        true
    }

    fn before_update(&self, _event: &EntryEvent) -> bool {
        true
    }

    fn before_destroy(&self, _event: &EntryEvent) -> bool {
        true
    }

    fn before_region_clear(&self, _region: &str) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReadOnly;

    impl CacheWriter for ReadOnly {
        fn before_update(&self, _event: &EntryEvent) -> bool {
            false
        }

        fn before_destroy(&self, _event: &EntryEvent) -> bool {
            false
        }
    }

    #[test]
    fn test_default_hooks_allow() {
        let writer = ReadOnly;
        let event = EntryEvent::new("Portfolios", "Key1", EntryOperation::Create);
        assert!(writer.before_create(&event));
        assert!(writer.before_region_clear("Portfolios"));
        assert!(!writer.before_update(&event));
        assert!(!writer.before_destroy(&event));
    }

    #[test]
    fn test_entry_event() {
        let event = EntryEvent::new("Counters", 7, EntryOperation::Destroy);
        assert_eq!(event.key, "7");
        assert_eq!(event.operation.to_string(), "destroy");
    }
}

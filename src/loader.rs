//! Read-through loading for region misses.
//!
//! When `Region::get` misses, the region's [`CacheLoader`] (if any) is asked
//! for the value. A loaded value is stored in the region before it is returned,
//! so the next `get` is a hit.
//!
//! # Implementing CacheLoader
//!
//! The trait returns a boxed future so it can be held as
//! `Arc<dyn CacheLoader<K, V>>` by a region:
//!
//! ```
//! use futures::future::BoxFuture;
//! use futures::FutureExt;
//! use region_cache::loader::CacheLoader;
//! use region_cache::Result;
//!
//! struct Squares;
//!
//! impl CacheLoader<u32, u64> for Squares {
//!     fn load<'a>(&'a self, key: &'a u32) -> BoxFuture<'a, Result<Option<u64>>> {
//!         async move { Ok(Some(u64::from(*key) * u64::from(*key))) }.boxed()
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! Return `Ok(None)` when the source has no value for the key; the region
//! reports a plain miss. Return `Err` for failures of the source itself
//! (connectivity, timeouts, decoding). The error reaches the caller of `get`.

use crate::error::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// Source of values for keys missing from a region.
pub trait CacheLoader<K, V>: Send + Sync {
    /// Load the value for `key`.
    ///
    /// # Returns
    /// - `Ok(Some(value))` - Value found, will be stored in the region
    /// - `Ok(None)` - No value for this key (not an error)
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the load fails
    fn load<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>>;
}

// ============================================================================
// In-Memory Loader
// ============================================================================

/// Map-backed loader for tests and demos.
///
/// Counts every `load` call so tests can tell a region hit from a load.
pub struct InMemoryLoader<K, V> {
    data: RwLock<HashMap<K, V>>,
    loads: AtomicUsize,
}

impl<K: Eq + Hash, V: Clone> InMemoryLoader<K, V> {
    pub fn new() -> Self {
        InMemoryLoader {
            data: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    /// Insert or replace the value served for `key`.
    pub fn insert(&self, key: K, value: V) {
        if let Ok(mut data) = self.data.write() {
            data.insert(key, value);
        }
    }

    /// Number of `load` calls so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash, V: Clone> Default for InMemoryLoader<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheLoader<K, V> for InMemoryLoader<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn load<'a>(&'a self, key: &'a K) -> BoxFuture<'a, Result<Option<V>>> {
        async move {
            self.loads.fetch_add(1, Ordering::Relaxed);
            let value = self
                .data
                .read()
                .map_err(|e| crate::error::Error::LoaderError(e.to_string()))?
                .get(key)
                .cloned();
            Ok(value)
        }
        .boxed()
    }
}

//! Cache handle and factory.
//!
//! A [`Cache`] owns the backend, the set of regions, the type registry and the
//! metrics hooks. It is created once through [`CacheFactory`] and then shared by
//! cloning; every clone points at the same state.
//!
//! ```
//! use region_cache::model::Portfolio;
//! use region_cache::CacheFactory;
//! use std::time::Duration;
//!
//! # async fn run() -> region_cache::Result<()> {
//! let cache = CacheFactory::new()
//!     .name("quickstart")
//!     .query_timeout(Duration::from_secs(5))
//!     .create()?;
//!
//! let region = cache
//!     .create_region_factory()
//!     .create::<String, Portfolio>("Portfolios")?;
//! region.put("Key1".to_string(), Portfolio::new(1, 10)).await?;
//!
//! cache.close();
//! # Ok(())
//! # }
//! ```

use crate::backend::{CacheBackend, InMemoryBackend};
use crate::cacheable::Cacheable;
use crate::error::{Error, Result};
use crate::key::{KeyKind, RegionKey};
use crate::observability::{CacheMetrics, NoOpMetrics, TtlPolicy};
use crate::query::QueryService;
use crate::region::{Region, RegionFactory, RegionSettings};
use crate::serialization::TypeRegistry;
use dashmap::DashMap;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cache-wide settings.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Name used in log output.
    pub name: String,

    /// Default timeout for queries. `None` lets queries run to completion.
    ///
    /// A single query can override it with `Query::with_timeout`.
    pub query_timeout: Option<Duration>,

    /// Entry TTL for regions created without `entry_time_to_live`.
    pub ttl_policy: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            name: "region-cache".to_string(),
            query_timeout: None,
            ttl_policy: TtlPolicy::default(),
        }
    }
}

/// Builder for a [`Cache`].
pub struct CacheFactory {
    config: CacheConfig,
    metrics: Arc<dyn CacheMetrics>,
}

impl CacheFactory {
    pub fn new() -> Self {
        CacheFactory {
            config: CacheConfig::default(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = Some(timeout);
        self
    }

    pub fn ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.config.ttl_policy = policy;
        self
    }

    /// Set custom metrics handler.
    pub fn metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = Arc::from(metrics);
        self
    }

    /// Create a cache over a fresh [`InMemoryBackend`].
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn create(self) -> Result<Cache<InMemoryBackend>> {
        self.create_with_backend(InMemoryBackend::new())
    }

    /// Create a cache over the given backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn create_with_backend<B: CacheBackend>(self, backend: B) -> Result<Cache<B>> {
        if self.config.name.trim().is_empty() {
            return Err(Error::ConfigError("cache name must not be empty".to_string()));
        }
        if self.config.query_timeout == Some(Duration::ZERO) {
            return Err(Error::ConfigError(
                "query timeout must be greater than zero".to_string(),
            ));
        }

        info!("✓ Cache '{}' created", self.config.name);
        Ok(Cache {
            inner: Arc::new(CacheInner {
                config: self.config,
                backend,
                regions: DashMap::new(),
                types: TypeRegistry::new(),
                metrics: self.metrics,
                closed: AtomicBool::new(false),
            }),
        })
    }
}

impl Default for CacheFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// A region as recorded by the cache.
///
/// `settings` holds an `Arc<RegionSettings<K, V>>` for the region's own key
/// and value types; `get_region` recovers it by downcasting.
pub(crate) struct RegionEntry {
    pub value_type: &'static str,
    pub key_kind: KeyKind,
    pub settings: Arc<dyn Any + Send + Sync>,
}

/// State shared by every clone of a [`Cache`] and by its regions and queries.
pub(crate) struct CacheInner<B: CacheBackend> {
    pub config: CacheConfig,
    pub backend: B,
    pub regions: DashMap<String, RegionEntry>,
    pub types: TypeRegistry,
    pub metrics: Arc<dyn CacheMetrics>,
    closed: AtomicBool,
}

impl<B: CacheBackend> CacheInner<B> {
    pub fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::CacheClosed)
        } else {
            Ok(())
        }
    }

    /// Value type name and key kind the region was created with.
    pub fn region_types(&self, region: &str) -> Result<(&'static str, KeyKind)> {
        self.regions
            .get(region)
            .map(|entry| (entry.value_type, entry.key_kind))
            .ok_or_else(|| Error::RegionNotFound(region.to_string()))
    }
}

/// Handle to a cache. Clones share the same cache.
pub struct Cache<B: CacheBackend = InMemoryBackend> {
    inner: Arc<CacheInner<B>>,
}

impl<B: CacheBackend> Clone for Cache<B> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CacheBackend> Cache<B> {
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Direct access to the storage backend.
    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Start configuring a new region.
    pub fn create_region_factory(&self) -> RegionFactory<B> {
        RegionFactory::new(Arc::clone(&self.inner))
    }

    /// Reopen a region created earlier through a [`RegionFactory`].
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::RegionNotFound` if no region has this name
    /// - `Error::RegionTypeMismatch` if the region holds other key or value types
    pub fn get_region<K: RegionKey, V: Cacheable>(&self, name: &str) -> Result<Region<K, V, B>> {
        self.inner.ensure_open()?;

        let entry = self
            .inner
            .regions
            .get(name)
            .ok_or_else(|| Error::RegionNotFound(name.to_string()))?;

        let settings = Arc::clone(&entry.settings)
            .downcast::<RegionSettings<K, V>>()
            .map_err(|_| Error::RegionTypeMismatch {
                region: name.to_string(),
                expected: format!("{} keyed by {}", V::type_name(), std::any::type_name::<K>()),
                found: entry.value_type.to_string(),
            })?;

        Ok(Region::from_parts(name, Arc::clone(&self.inner), settings))
    }

    /// Names of all regions, sorted.
    pub fn region_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .regions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Make `T` queryable. Registering a type twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheClosed` if the cache has been closed.
    pub fn register_type<T: Cacheable>(&self) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.types.register::<T>();
        Ok(())
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.inner.types
    }

    /// Service for creating queries against this cache's regions.
    pub fn query_service(&self) -> QueryService<B> {
        QueryService::new(Arc::clone(&self.inner))
    }

    /// Close the cache. Every later operation fails with `Error::CacheClosed`.
    ///
    /// Closing an already closed cache does nothing.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            self.inner.regions.clear();
            info!("✓ Cache '{}' closed", self.inner.config.name);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
    struct Note {
        text: String,
    }

    impl Cacheable for Note {
        fn type_name() -> &'static str {
            "Note"
        }
    }

    #[test]
    fn test_factory_rejects_bad_config() {
        assert!(matches!(
            CacheFactory::new().name("  ").create(),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            CacheFactory::new().query_timeout(Duration::ZERO).create(),
            Err(Error::ConfigError(_))
        ));
    }

    #[test]
    fn test_factory_options() {
        let cache = CacheFactory::new()
            .name("orders")
            .query_timeout(Duration::from_secs(2))
            .ttl_policy(TtlPolicy::Fixed(Duration::from_secs(60)))
            .create()
            .expect("Failed to create cache");

        assert_eq!(cache.name(), "orders");
        assert_eq!(cache.config().query_timeout, Some(Duration::from_secs(2)));
        assert!(!cache.is_closed());
    }

    #[test]
    fn test_register_type() {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        cache.register_type::<Note>().expect("Failed to register");
        cache.register_type::<Note>().expect("Failed to register twice");
        assert!(cache.type_registry().is_registered("Note"));
        assert_eq!(cache.type_registry().len(), 1);
    }

    #[test]
    fn test_get_region() {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        cache
            .create_region_factory()
            .create::<String, Note>("Notes")
            .expect("Failed to create region");

        assert!(cache.get_region::<String, Note>("Notes").is_ok());
        assert_eq!(cache.region_names(), vec!["Notes".to_string()]);

        assert!(matches!(
            cache.get_region::<String, Note>("Missing"),
            Err(Error::RegionNotFound(_))
        ));
        assert!(matches!(
            cache.get_region::<u32, Note>("Notes"),
            Err(Error::RegionTypeMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        let region = cache
            .create_region_factory()
            .create::<String, Note>("Notes")
            .expect("Failed to create region");

        let clone = cache.clone();
        cache.close();
        clone.close();
        assert!(clone.is_closed());

        assert!(matches!(
            cache.register_type::<Note>(),
            Err(Error::CacheClosed)
        ));
        assert!(matches!(
            cache.get_region::<String, Note>("Notes"),
            Err(Error::CacheClosed)
        ));
        let note = Note {
            text: "late".to_string(),
        };
        assert!(matches!(
            region.put("k".to_string(), note).await,
            Err(Error::CacheClosed)
        ));
    }
}

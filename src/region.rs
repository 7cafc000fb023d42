//! Regions: typed key/value namespaces inside a cache.
//!
//! Every entry of region `R` lives in the backend under `"R:{key}"` as a
//! versioned postcard envelope. A region consults its [`CacheWriter`] before
//! mutating and its [`CacheLoader`] on a miss.

use crate::backend::{CacheBackend, InMemoryBackend};
use crate::cache::{CacheInner, RegionEntry};
use crate::cacheable::Cacheable;
use crate::error::{Error, Result};
use crate::key::{KeyKind, RegionKey, RegionKeyBuilder};
use crate::loader::CacheLoader;
use crate::query::{QueryService, SelectResults};
use crate::serialization::{check_header, is_stale_entry};
use crate::writer::{CacheWriter, EntryEvent, EntryOperation};
use dashmap::mapref::entry::Entry;
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-region options fixed when the region is created.
pub(crate) struct RegionSettings<K, V> {
    /// Entry TTL; `None` keeps entries until removed.
    pub ttl: Option<Duration>,
    pub writer: Option<Arc<dyn CacheWriter>>,
    pub loader: Option<Arc<dyn CacheLoader<K, V>>>,
}

/// Builder for regions, obtained from `Cache::create_region_factory`.
///
/// ```
/// use region_cache::model::Portfolio;
/// use region_cache::CacheFactory;
/// use std::time::Duration;
///
/// # fn run() -> region_cache::Result<()> {
/// let cache = CacheFactory::new().create()?;
/// let region = cache
///     .create_region_factory()
///     .entry_time_to_live(Duration::from_secs(600))
///     .create::<String, Portfolio>("Portfolios")?;
/// assert_eq!(region.name(), "Portfolios");
/// # Ok(())
/// # }
/// ```
pub struct RegionFactory<B: CacheBackend = InMemoryBackend> {
    cache: Arc<CacheInner<B>>,
    entry_ttl: Option<Duration>,
    writer: Option<Arc<dyn CacheWriter>>,
    /// An `Arc<dyn CacheLoader<K, V>>`, checked against `K` and `V` in `create`.
    loader: Option<Box<dyn Any + Send + Sync>>,
}

impl<B: CacheBackend> RegionFactory<B> {
    pub(crate) fn new(cache: Arc<CacheInner<B>>) -> Self {
        RegionFactory {
            cache,
            entry_ttl: None,
            writer: None,
            loader: None,
        }
    }

    /// Expire entries this long after they were written.
    ///
    /// Overrides the cache's `TtlPolicy` for this region.
    pub fn entry_time_to_live(mut self, ttl: Duration) -> Self {
        self.entry_ttl = Some(ttl);
        self
    }

    pub fn cache_writer(mut self, writer: Arc<dyn CacheWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    /// Loader consulted when `get` misses.
    pub fn cache_loader<K: RegionKey, V: Cacheable>(
        mut self,
        loader: Arc<dyn CacheLoader<K, V>>,
    ) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Create the region.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::IllegalArgument` for a name that is not a query identifier,
    ///   or a loader whose key or value type differs from `K`/`V`
    /// - `Error::RegionExists` if the name is taken
    pub fn create<K: RegionKey, V: Cacheable>(self, name: &str) -> Result<Region<K, V, B>> {
        self.cache.ensure_open()?;
        RegionKeyBuilder::validate_region_name(name)?;

        let loader = match self.loader {
            Some(boxed) => Some(
                *boxed
                    .downcast::<Arc<dyn CacheLoader<K, V>>>()
                    .map_err(|_| {
                        Error::IllegalArgument(format!(
                            "cache loader for region {} does not produce {}",
                            name,
                            V::type_name()
                        ))
                    })?,
            ),
            None => None,
        };

        let ttl = self
            .entry_ttl
            .or_else(|| self.cache.config.ttl_policy.get_ttl(name));

        let settings = Arc::new(RegionSettings {
            ttl,
            writer: self.writer,
            loader,
        });

        match self.cache.regions.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(Error::RegionExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(RegionEntry {
                    value_type: V::type_name(),
                    key_kind: KeyKind::of::<K>(),
                    settings: Arc::clone(&settings) as Arc<dyn Any + Send + Sync>,
                });
            }
        }

        info!("✓ Region /{} created for {}", name, V::type_name());
        Ok(Region::from_parts(name, self.cache, settings))
    }
}

/// A typed region handle. Clones share the same region.
pub struct Region<K, V, B: CacheBackend = InMemoryBackend> {
    name: Arc<str>,
    cache: Arc<CacheInner<B>>,
    settings: Arc<RegionSettings<K, V>>,
}

impl<K, V, B: CacheBackend> Clone for Region<K, V, B> {
    fn clone(&self) -> Self {
        Region {
            name: Arc::clone(&self.name),
            cache: Arc::clone(&self.cache),
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<K: RegionKey, V: Cacheable, B: CacheBackend> Region<K, V, B> {
    pub(crate) fn from_parts(
        name: &str,
        cache: Arc<CacheInner<B>>,
        settings: Arc<RegionSettings<K, V>>,
    ) -> Self {
        Region {
            name: Arc::from(name),
            cache,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Region path as written in queries: `/name`.
    pub fn full_path(&self) -> String {
        format!("/{}", self.name)
    }

    fn backend_key(&self, key: &K) -> String {
        RegionKeyBuilder::build(&self.name, key)
    }

    fn check_writer(&self, event: &EntryEvent) -> Result<()> {
        let Some(writer) = &self.settings.writer else {
            return Ok(());
        };
        let allowed = match event.operation {
            EntryOperation::Create => writer.before_create(event),
            EntryOperation::Update => writer.before_update(event),
            EntryOperation::Destroy => writer.before_destroy(event),
        };
        if allowed {
            Ok(())
        } else {
            debug!(
                "✗ Writer vetoed {} of {} in /{}",
                event.operation, event.key, self.name
            );
            Err(Error::CacheWriterVetoed(format!(
                "{} of key {} in region /{}",
                event.operation, event.key, self.name
            )))
        }
    }

    /// Decode stored bytes. Stale entries are evicted and reported as `None`.
    async fn decode_entry(&self, backend_key: &str, bytes: &[u8]) -> Result<Option<V>> {
        match V::deserialize_from_cache(bytes) {
            Ok(value) => {
                value.validate()?;
                Ok(Some(value))
            }
            Err(e) if is_stale_entry(&e) => {
                warn!("Evicting stale entry {}: {}", backend_key, e);
                self.cache.backend.delete(backend_key).await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Insert or replace the value for `key`.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::CacheWriterVetoed` if the writer rejects the create or update
    /// - `Error::SerializationError` / `Error::BackendError` from storage
    pub async fn put(&self, key: K, value: V) -> Result<()> {
        self.cache.ensure_open()?;
        let timer = Instant::now();
        let backend_key = self.backend_key(&key);

        if self.settings.writer.is_some() {
            let operation = if self.cache.backend.exists(&backend_key).await? {
                EntryOperation::Update
            } else {
                EntryOperation::Create
            };
            self.check_writer(&EntryEvent::new(&self.name, &key, operation))?;
        }

        let bytes = value.serialize_for_cache()?;
        if let Err(e) = self
            .cache
            .backend
            .set(&backend_key, bytes, self.settings.ttl)
            .await
        {
            self.cache.metrics.record_error(&backend_key, &e.to_string());
            return Err(e);
        }

        self.cache.metrics.record_put(&backend_key, timer.elapsed());
        debug!("✓ Put {} into /{}", key, self.name);
        Ok(())
    }

    /// Look up `key`, falling back to the region's loader on a miss.
    ///
    /// A loaded value is stored before it is returned.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::DeserializationError` / `Error::ValidationError` for a corrupt entry
    /// - Any error returned by the loader
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        self.cache.ensure_open()?;
        let timer = Instant::now();
        let backend_key = self.backend_key(key);

        if let Some(bytes) = self.cache.backend.get(&backend_key).await? {
            match self.decode_entry(&backend_key, &bytes).await {
                Ok(Some(value)) => {
                    self.cache.metrics.record_hit(&backend_key, timer.elapsed());
                    return Ok(Some(value));
                }
                Ok(None) => {}
                Err(e) => {
                    self.cache.metrics.record_error(&backend_key, &e.to_string());
                    return Err(e);
                }
            }
        }

        self.cache.metrics.record_miss(&backend_key, timer.elapsed());

        let Some(loader) = &self.settings.loader else {
            return Ok(None);
        };

        debug!("Region miss for {}, consulting loader", backend_key);
        match loader.load(key).await? {
            Some(value) => {
                let bytes = value.serialize_for_cache()?;
                self.cache
                    .backend
                    .set(&backend_key, bytes, self.settings.ttl)
                    .await?;
                debug!("✓ Loaded {} into /{}", key, self.name);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// `get` for several keys; results line up with `keys`.
    ///
    /// # Errors
    ///
    /// Returns the first error any lookup produced.
    pub async fn get_all(&self, keys: &[K]) -> Result<Vec<Option<V>>> {
        futures::future::try_join_all(keys.iter().map(|key| self.get(key))).await
    }

    /// Remove `key`, returning the value it held.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::CacheWriterVetoed` if the writer rejects the destroy
    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        self.cache.ensure_open()?;
        let timer = Instant::now();
        let backend_key = self.backend_key(key);

        let Some(bytes) = self.cache.backend.get(&backend_key).await? else {
            return Ok(None);
        };

        self.check_writer(&EntryEvent::new(&self.name, key, EntryOperation::Destroy))?;

        let previous = match V::deserialize_from_cache(&bytes) {
            Ok(value) => Some(value),
            Err(e) if is_stale_entry(&e) => None,
            Err(e) => return Err(e),
        };
        self.cache.backend.delete(&backend_key).await?;
        self.cache
            .metrics
            .record_destroy(&backend_key, timer.elapsed());
        debug!("✓ Removed {} from /{}", key, self.name);
        Ok(previous)
    }

    /// # Errors
    ///
    /// Returns `Error::CacheClosed` if the cache has been closed.
    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        self.cache.ensure_open()?;
        self.cache.backend.exists(&self.backend_key(key)).await
    }

    /// Every stored entry, in region key order.
    async fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        self.cache.ensure_open()?;
        let mut entries = self
            .cache
            .backend
            .scan_prefix(&RegionKeyBuilder::prefix(&self.name))
            .await?;
        KeyKind::of::<K>().sort_entries(&self.name, &mut entries);
        Ok(entries)
    }

    /// All keys, in key order: numeric for integer keys, textual otherwise.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::DeserializationError` if a stored key does not parse as `K`
    pub async fn keys(&self) -> Result<Vec<K>> {
        self.scan()
            .await?
            .iter()
            .map(|(full_key, _)| RegionKeyBuilder::parse::<K>(&self.name, full_key))
            .collect()
    }

    /// All values, in key order. Stale entries are evicted and skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::CacheClosed` if the cache has been closed.
    pub async fn values(&self) -> Result<Vec<V>> {
        let mut values = Vec::new();
        for (full_key, bytes) in self.scan().await? {
            if let Some(value) = self.decode_entry(&full_key, &bytes).await? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Number of live entries. Stale entries are evicted and not counted.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::DeserializationError` for an entry without a readable header
    pub async fn len(&self) -> Result<usize> {
        let mut live = 0;
        for (full_key, bytes) in self.scan().await? {
            match check_header(&bytes) {
                Ok(()) => live += 1,
                Err(e) if is_stale_entry(&e) => {
                    warn!("Evicting stale entry {}: {}", full_key, e);
                    self.cache.backend.delete(&full_key).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(live)
    }

    /// # Errors
    ///
    /// Returns `Error::CacheClosed` if the cache has been closed.
    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove every entry.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::CacheWriterVetoed` if the writer rejects the clear
    pub async fn clear(&self) -> Result<()> {
        self.cache.ensure_open()?;
        if let Some(writer) = &self.settings.writer {
            if !writer.before_region_clear(&self.name) {
                return Err(Error::CacheWriterVetoed(format!(
                    "clear of region /{}",
                    self.name
                )));
            }
        }

        let entries = self.scan().await?;
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        self.cache.backend.mdelete(&keys).await?;
        info!("✓ Cleared {} entries from /{}", keys.len(), self.name);
        Ok(())
    }

    /// Run `SELECT DISTINCT * FROM /<region> this WHERE <predicate>`.
    ///
    /// # Errors
    ///
    /// Any parse or execution error of the query.
    pub async fn query(&self, predicate: &str) -> Result<SelectResults> {
        let query_string = format!(
            "SELECT DISTINCT * FROM {} this WHERE {}",
            self.full_path(),
            predicate
        );
        QueryService::new(Arc::clone(&self.cache))
            .new_query(&query_string)?
            .execute()
            .await
    }

    /// The single value matching `predicate`, if any.
    ///
    /// # Errors
    ///
    /// - `Error::QueryExecution` if more than one value matches
    /// - Any parse or execution error of the query
    pub async fn select_value(&self, predicate: &str) -> Result<Option<V>> {
        let results = self.query(predicate).await?;
        match results.size() {
            0 => Ok(None),
            1 => results.into_typed::<V>().map(|mut rows| rows.pop()),
            n => Err(Error::QueryExecution(format!(
                "selectValue on /{} expected at most one result, got {}",
                self.name, n
            ))),
        }
    }

    /// True when at least one value matches `predicate`.
    ///
    /// # Errors
    ///
    /// Any parse or execution error of the query.
    pub async fn exists_value(&self, predicate: &str) -> Result<bool> {
        Ok(!self.query(predicate).await?.is_empty())
    }
}

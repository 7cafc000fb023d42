//! Integration tests for region-cache
//!
//! These tests drive the public API end to end: cache, regions, writers,
//! loaders and queries together.

use region_cache::backend::{CacheBackend, InMemoryBackend};
use region_cache::loader::InMemoryLoader;
use region_cache::model::{Portfolio, Position};
use region_cache::observability::{CacheMetrics, TtlPolicy};
use region_cache::query::Value;
use region_cache::{Cache, CacheFactory, CacheWriter, EntryEvent, Error, Region};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

async fn portfolios_cache() -> (Cache, Region<String, Portfolio>) {
    init_logging();
    let cache = CacheFactory::new()
        .name("integration")
        .create()
        .expect("Failed to create cache");
    let region = cache
        .create_region_factory()
        .create::<String, Portfolio>("Portfolios")
        .expect("Failed to create region");
    cache
        .register_type::<Portfolio>()
        .expect("Failed to register Portfolio");
    cache
        .register_type::<Position>()
        .expect("Failed to register Position");

    for (id, size) in [(1, 10), (2, 20), (3, 30)] {
        region
            .put(format!("Key{}", id), Portfolio::new(id, size))
            .await
            .expect("Failed to put portfolio");
    }
    (cache, region)
}

// ============================================================================
// Quick-start scenario
// ============================================================================

#[tokio::test]
async fn test_remote_query_scenario() {
    let (cache, region) = portfolios_cache().await;
    let query_service = cache.query_service();

    let all = query_service
        .new_query("SELECT DISTINCT * FROM /Portfolios")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(all.size(), 3);
    assert!(all.as_result_set().is_some());

    let structs = query_service
        .new_query("SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > 1")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    let set = structs.as_struct_set().expect("Expected a StructSet");
    assert_eq!(set.size(), 2);
    let rows: Vec<(Value, Value)> = set
        .iter()
        .map(|row| (row[0].clone(), row[1].clone()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (Value::Int(2), Value::from("active")),
            (Value::Int(3), Value::from("inactive")),
        ]
    );
    assert_eq!(set.get(0).unwrap().field_name(0), Some("ID"));
    assert_eq!(set.get(0).unwrap().field_name(1), Some("status"));

    let by_id = region.query("ID = 2").await.expect("Failed to query");
    assert_eq!(by_id.size(), 1);
    let typed: Vec<Portfolio> = by_id.into_typed().expect("Failed to convert");
    assert_eq!(typed, vec![Portfolio::new(2, 20)]);

    let selected = region
        .select_value("ID = 3")
        .await
        .expect("Failed to select");
    assert_eq!(selected, Some(Portfolio::new(3, 30)));

    assert!(!region.exists_value("ID = 4").await.expect("Failed to check"));

    let params = query_service
        .new_query("SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > $1 and status=$2")
        .expect("Failed to parse")
        .execute_with_params(&[Value::from(1), Value::from("active")])
        .await
        .expect("Failed to execute");
    let set = params.as_struct_set().expect("Expected a StructSet");
    assert_eq!(set.size(), 1);
    assert_eq!(set.get(0).unwrap().get_by_name("ID"), Some(&Value::Int(2)));
    assert_eq!(
        set.get(0).unwrap().get_by_name("status"),
        Some(&Value::from("active"))
    );

    cache.close();
    assert!(cache.is_closed());
}

#[tokio::test]
async fn test_nested_paths_and_positions() {
    let (cache, _region) = portfolios_cache().await;

    let results = cache
        .query_service()
        .new_query("SELECT p.ID FROM /Portfolios p WHERE p.position2 IS NOT NULL")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(results.to_values(), vec![Value::Int(1), Value::Int(3)]);

    let results = cache
        .query_service()
        .new_query("SELECT DISTINCT position1.secId AS sec FROM /Portfolios ORDER BY position1.secId")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(
        results.to_values(),
        vec![Value::from("APPL"), Value::from("MSFT"), Value::from("YHOO")]
    );
}

// ============================================================================
// Closed cache
// ============================================================================

#[tokio::test]
async fn test_operations_after_close() {
    let (cache, region) = portfolios_cache().await;
    let query = cache
        .query_service()
        .new_query("SELECT * FROM /Portfolios")
        .expect("Failed to parse");

    cache.close();
    cache.close();

    assert!(matches!(
        region.get(&"Key1".to_string()).await,
        Err(Error::CacheClosed)
    ));
    assert!(matches!(
        region.put("Key4".to_string(), Portfolio::new(4, 40)).await,
        Err(Error::CacheClosed)
    ));
    assert!(matches!(region.keys().await, Err(Error::CacheClosed)));
    assert!(matches!(query.execute().await, Err(Error::CacheClosed)));
    assert!(matches!(
        cache.query_service().new_query("SELECT * FROM /Portfolios"),
        Err(Error::CacheClosed)
    ));
    assert!(matches!(
        cache.create_region_factory().create::<String, Position>("Positions"),
        Err(Error::CacheClosed)
    ));
}

// ============================================================================
// Writers and loaders
// ============================================================================

struct ActiveOnly {
    seen: Mutex<Vec<String>>,
}

impl CacheWriter for ActiveOnly {
    fn before_create(&self, event: &EntryEvent) -> bool {
        self.seen
            .lock()
            .expect("Failed to lock")
            .push(event.key.clone());
        event.key != "Key9"
    }

    fn before_destroy(&self, _event: &EntryEvent) -> bool {
        false
    }
}

#[tokio::test]
async fn test_writer_vetoes() {
    init_logging();
    let writer = Arc::new(ActiveOnly {
        seen: Mutex::new(Vec::new()),
    });
    let cache = CacheFactory::new().create().expect("Failed to create cache");
    let region = cache
        .create_region_factory()
        .cache_writer(writer.clone())
        .create::<String, Portfolio>("Portfolios")
        .expect("Failed to create region");

    region
        .put("Key1".to_string(), Portfolio::new(1, 10))
        .await
        .expect("Failed to put");
    let err = region
        .put("Key9".to_string(), Portfolio::new(9, 10))
        .await
        .expect_err("Create should be vetoed");
    assert!(matches!(err, Error::CacheWriterVetoed(_)));

    assert!(matches!(
        region.remove(&"Key1".to_string()).await,
        Err(Error::CacheWriterVetoed(_))
    ));
    assert_eq!(
        region.keys().await.expect("Failed to list keys"),
        vec!["Key1".to_string()]
    );
    assert_eq!(
        *writer.seen.lock().expect("Failed to lock"),
        vec!["Key1".to_string(), "Key9".to_string()]
    );
}

#[tokio::test]
async fn test_loader_read_through_and_get_all() {
    init_logging();
    let loader = Arc::new(InMemoryLoader::new());
    loader.insert(7u32, Portfolio::new(7, 10));
    loader.insert(8u32, Portfolio::new(8, 10));

    let cache = CacheFactory::new().create().expect("Failed to create cache");
    cache
        .register_type::<Portfolio>()
        .expect("Failed to register");
    let region = cache
        .create_region_factory()
        .cache_loader::<u32, Portfolio>(loader.clone())
        .create::<u32, Portfolio>("Archive")
        .expect("Failed to create region");

    let loaded = region
        .get_all(&[7, 8, 9])
        .await
        .expect("Failed to get all");
    assert_eq!(loaded[0], Some(Portfolio::new(7, 10)));
    assert_eq!(loaded[1], Some(Portfolio::new(8, 10)));
    assert!(loaded[2].is_none());
    assert_eq!(loader.load_count(), 3);

    // Loaded entries are now region entries and visible to queries
    assert_eq!(region.len().await.expect("Failed to count"), 2);
    assert!(region
        .exists_value("status = 'active'")
        .await
        .expect("Failed to query"));

    let keys = cache
        .query_service()
        .new_query("SELECT * FROM /Archive.keys k WHERE k > 7")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(keys.to_values(), vec![Value::Int(8)]);
}

#[tokio::test]
async fn test_integer_keyed_region_order() {
    init_logging();
    let cache = CacheFactory::new().create().expect("Failed to create cache");
    cache
        .register_type::<Portfolio>()
        .expect("Failed to register");
    let region = cache
        .create_region_factory()
        .create::<u32, Portfolio>("Archive")
        .expect("Failed to create region");

    for id in [2, 10, 1] {
        region
            .put(id as u32, Portfolio::new(id, 10))
            .await
            .expect("Failed to put");
    }

    assert_eq!(region.keys().await.expect("Failed to list keys"), vec![1, 2, 10]);

    let rows = region.query("ID > 0").await.expect("Failed to query");
    let ids: Vec<i32> = rows
        .into_typed::<Portfolio>()
        .expect("Failed to convert")
        .iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 10]);
}

#[tokio::test]
async fn test_query_timeout_expires() {
    let (cache, region) = portfolios_cache().await;
    for id in 4..=5000 {
        region
            .put(format!("Key{}", id), Portfolio::new(id, 1))
            .await
            .expect("Failed to put");
    }

    let result = cache
        .query_service()
        .new_query("SELECT DISTINCT * FROM /Portfolios ORDER BY status")
        .expect("Failed to parse")
        .with_timeout(Duration::from_nanos(1))
        .execute()
        .await;
    assert!(matches!(result, Err(Error::Timeout(_))));

    // A generous timeout still completes
    let rows = cache
        .query_service()
        .new_query("SELECT COUNT(*) FROM /Portfolios")
        .expect("Failed to parse")
        .with_timeout(Duration::from_secs(30))
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(rows.to_values(), vec![Value::Int(5000)]);
}

// ============================================================================
// Regions and configuration
// ============================================================================

#[tokio::test]
async fn test_get_region_reopens_same_entries() {
    let (cache, _region) = portfolios_cache().await;

    let reopened = cache
        .get_region::<String, Portfolio>("Portfolios")
        .expect("Failed to reopen region");
    assert_eq!(reopened.len().await.expect("Failed to count"), 3);

    assert!(matches!(
        cache.get_region::<String, Position>("Portfolios"),
        Err(Error::RegionTypeMismatch { .. })
    ));
    assert!(matches!(
        cache.get_region::<String, Portfolio>("Positions"),
        Err(Error::RegionNotFound(_))
    ));
}

#[tokio::test]
async fn test_ttl_policy_applies_to_regions() {
    init_logging();
    let cache = CacheFactory::new()
        .ttl_policy(TtlPolicy::PerRegion(|region| match region {
            "Sessions" => Duration::from_millis(20),
            _ => Duration::from_secs(3600),
        }))
        .create()
        .expect("Failed to create cache");

    let sessions = cache
        .create_region_factory()
        .create::<String, Portfolio>("Sessions")
        .expect("Failed to create region");
    let portfolios = cache
        .create_region_factory()
        .create::<String, Portfolio>("Portfolios")
        .expect("Failed to create region");

    sessions
        .put("s".to_string(), Portfolio::new(1, 1))
        .await
        .expect("Failed to put");
    portfolios
        .put("p".to_string(), Portfolio::new(1, 1))
        .await
        .expect("Failed to put");

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(sessions.is_empty().await.expect("Failed to count"));
    assert_eq!(portfolios.len().await.expect("Failed to count"), 1);
}

#[tokio::test]
async fn test_custom_backend_and_metrics() {
    #[derive(Clone, Default)]
    struct Counting {
        puts: Arc<AtomicUsize>,
        queries: Arc<AtomicUsize>,
    }

    impl CacheMetrics for Counting {
        fn record_put(&self, _key: &str, _duration: Duration) {
            self.puts.fetch_add(1, Ordering::Relaxed);
        }

        fn record_query(&self, _query: &str, _rows: usize, _duration: Duration) {
            self.queries.fetch_add(1, Ordering::Relaxed);
        }
    }

    init_logging();
    let backend = InMemoryBackend::new();
    let counting = Counting::default();
    let cache = CacheFactory::new()
        .metrics(Box::new(counting.clone()))
        .create_with_backend(backend.clone())
        .expect("Failed to create cache");
    cache
        .register_type::<Portfolio>()
        .expect("Failed to register");

    let region = cache
        .create_region_factory()
        .create::<String, Portfolio>("Portfolios")
        .expect("Failed to create region");
    region
        .put("Key1".to_string(), Portfolio::new(1, 10))
        .await
        .expect("Failed to put");

    assert!(backend
        .exists("Portfolios:Key1")
        .await
        .expect("Failed to check"));
    assert_eq!(backend.len().await, 1);

    region.query("ID = 1").await.expect("Failed to query");
    assert_eq!(counting.puts.load(Ordering::Relaxed), 1);
    assert_eq!(counting.queries.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_concurrent_puts_from_tasks() {
    let (cache, region) = portfolios_cache().await;

    let handles: Vec<_> = (10..20)
        .map(|id| {
            let region = region.clone();
            tokio::spawn(async move {
                region
                    .put(format!("Key{}", id), Portfolio::new(id, 8))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle
            .await
            .expect("Task panicked")
            .expect("Failed to put");
    }

    let count = cache
        .query_service()
        .new_query("SELECT COUNT(*) FROM /Portfolios")
        .expect("Failed to parse")
        .execute()
        .await
        .expect("Failed to execute");
    assert_eq!(count.to_values(), vec![Value::Int(13)]);
}

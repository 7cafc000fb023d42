//! Query language over region contents.
//!
//! Queries are a small OQL subset:
//!
//! ```text
//! SELECT [DISTINCT] (* | COUNT(*) | expr [AS alias], ...)
//! FROM /Region[.keys | .keySet | .values] [[AS] alias]
//! [WHERE condition]
//! [ORDER BY expr [ASC | DESC], ...]
//! [LIMIT n]
//! ```
//!
//! Keywords are case-insensitive. Paths (`ID`, `p.position1.secId`) name
//! serde fields of the stored values. `$1`, `$2`, ... are positional
//! parameters bound at execution time.
//!
//! ```
//! use region_cache::model::Portfolio;
//! use region_cache::query::Value;
//! use region_cache::CacheFactory;
//!
//! # async fn run() -> region_cache::Result<()> {
//! let cache = CacheFactory::new().create()?;
//! cache.register_type::<Portfolio>()?;
//! let region = cache
//!     .create_region_factory()
//!     .create::<String, Portfolio>("Portfolios")?;
//! region.put("Key2".to_string(), Portfolio::new(2, 10)).await?;
//!
//! let query = cache
//!     .query_service()
//!     .new_query("SELECT ID, status FROM /Portfolios WHERE ID > $1")?;
//! let results = query.execute_with_params(&[Value::from(1)]).await?;
//! assert_eq!(results.size(), 1);
//! # Ok(())
//! # }
//! ```

mod ast;
mod eval;
mod executor;
mod lexer;
mod parser;
mod results;
mod value;

pub(crate) use lexer::is_identifier;
pub use results::{ResultSet, SelectResults, Struct, StructSet};
pub use value::Value;

use crate::backend::{CacheBackend, InMemoryBackend};
use crate::cache::CacheInner;
use crate::error::{Error, Result};
use ast::SelectStatement;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Creates queries bound to one cache.
pub struct QueryService<B: CacheBackend = InMemoryBackend> {
    cache: Arc<CacheInner<B>>,
}

impl<B: CacheBackend> Clone for QueryService<B> {
    fn clone(&self) -> Self {
        QueryService {
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<B: CacheBackend> QueryService<B> {
    pub(crate) fn new(cache: Arc<CacheInner<B>>) -> Self {
        QueryService { cache }
    }

    /// Parse `query` into an executable [`Query`].
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::QuerySyntax` if the string does not parse
    pub fn new_query(&self, query: &str) -> Result<Query<B>> {
        self.cache.ensure_open()?;
        let statement = parser::parse_query(query)?;
        Ok(Query {
            cache: Arc::clone(&self.cache),
            text: query.to_string(),
            statement,
            timeout: self.cache.config.query_timeout,
        })
    }
}

/// A parsed query, ready to run any number of times.
pub struct Query<B: CacheBackend = InMemoryBackend> {
    cache: Arc<CacheInner<B>>,
    text: String,
    statement: SelectStatement,
    timeout: Option<Duration>,
}

impl<B: CacheBackend> Query<B> {
    pub fn query_string(&self) -> &str {
        &self.text
    }

    /// Override the cache's default query timeout for this query.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run without parameters.
    ///
    /// # Errors
    ///
    /// See [`Query::execute_with_params`].
    pub async fn execute(&self) -> Result<SelectResults> {
        self.execute_with_params(&[]).await
    }

    /// Run with positional parameters; `params[0]` binds `$1`.
    ///
    /// # Errors
    ///
    /// - `Error::CacheClosed` if the cache has been closed
    /// - `Error::RegionNotFound` if the FROM region does not exist
    /// - `Error::UnregisteredType` if the region's value type was never registered
    /// - `Error::QueryExecution` for an unbound parameter
    /// - `Error::TypeMismatch` for incompatible operands
    /// - `Error::Timeout` if the query outlives its timeout
    pub async fn execute_with_params(&self, params: &[Value]) -> Result<SelectResults> {
        let timer = Instant::now();
        let deadline = self.timeout.and_then(|limit| timer.checked_add(limit));
        let run = executor::execute(&self.cache, &self.statement, params, deadline);

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(Error::from)
                .and_then(|result| result),
            None => run.await,
        };

        match &outcome {
            Ok(results) => {
                self.cache
                    .metrics
                    .record_query(&self.text, results.size(), timer.elapsed());
            }
            Err(e) => self.cache.metrics.record_error(&self.text, &e.to_string()),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cacheable::Cacheable;
    use crate::model::Portfolio;
    use crate::CacheFactory;
    use crate::Cache;

    async fn portfolios() -> Cache {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        cache
            .register_type::<Portfolio>()
            .expect("Failed to register");
        let region = cache
            .create_region_factory()
            .create::<String, Portfolio>("Portfolios")
            .expect("Failed to create region");
        for id in 1..=3 {
            region
                .put(format!("Key{}", id), Portfolio::new(id, 10))
                .await
                .expect("Failed to put");
        }
        cache
    }

    async fn run(cache: &Cache, query: &str) -> Result<SelectResults> {
        cache.query_service().new_query(query)?.execute().await
    }

    #[tokio::test]
    async fn test_select_all() {
        let cache = portfolios().await;
        let results = run(&cache, "SELECT DISTINCT * FROM /Portfolios")
            .await
            .expect("Failed to query");
        assert_eq!(results.size(), 3);

        let typed: Vec<Portfolio> = results.into_typed().expect("Failed to convert");
        assert_eq!(typed[0], Portfolio::new(1, 10));
    }

    #[tokio::test]
    async fn test_struct_projection() {
        let cache = portfolios().await;
        let results = run(&cache, "SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > 1")
            .await
            .expect("Failed to query");

        let set = results.as_struct_set().expect("Expected struct rows");
        assert_eq!(set.field_names(), ["ID".to_string(), "status".to_string()]);
        assert_eq!(set.get(0).unwrap().values(), [Value::Int(2), Value::from("active")]);
        assert_eq!(set.get(1).unwrap().values(), [Value::Int(3), Value::from("inactive")]);
    }

    #[tokio::test]
    async fn test_single_column_distinct_and_order() {
        let cache = portfolios().await;

        let statuses = run(&cache, "SELECT DISTINCT status FROM /Portfolios")
            .await
            .expect("Failed to query");
        assert_eq!(
            statuses.to_values(),
            vec![Value::from("inactive"), Value::from("active")]
        );

        let ids = run(&cache, "SELECT p.ID FROM /Portfolios p ORDER BY p.ID DESC LIMIT 2")
            .await
            .expect("Failed to query");
        assert_eq!(ids.to_values(), vec![Value::Int(3), Value::Int(2)]);
    }

    #[tokio::test]
    async fn test_count_and_keys() {
        let cache = portfolios().await;

        let count = run(&cache, "SELECT COUNT(*) FROM /Portfolios WHERE status = 'inactive'")
            .await
            .expect("Failed to query");
        assert_eq!(count.to_values(), vec![Value::Int(2)]);

        let keys = run(&cache, "SELECT * FROM /Portfolios.keySet k WHERE k LIKE 'Key%'")
            .await
            .expect("Failed to query");
        assert_eq!(keys.size(), 3);
        assert_eq!(keys.to_values()[0], Value::from("Key1"));
    }

    #[tokio::test]
    async fn test_execution_errors() {
        let cache = portfolios().await;

        assert!(matches!(
            run(&cache, "SELECT * FROM /Missing").await,
            Err(Error::RegionNotFound(_))
        ));
        assert!(matches!(
            run(&cache, "SELECT * FROM /Portfolios WHERE ID > $1").await,
            Err(Error::QueryExecution(_))
        ));
        assert!(matches!(
            run(&cache, "SELECT * FROM /Portfolios WHERE status > 1").await,
            Err(Error::TypeMismatch(_))
        ));
        assert!(matches!(
            cache.query_service().new_query("SELECT FROM /Portfolios"),
            Err(Error::QuerySyntax(_))
        ));
    }

    #[tokio::test]
    async fn test_unregistered_type() {
        #[derive(Clone, serde::Serialize, serde::Deserialize)]
        struct Tag {
            name: String,
        }

        impl Cacheable for Tag {
            fn type_name() -> &'static str {
                "Tag"
            }
        }

        let cache = portfolios().await;
        cache
            .create_region_factory()
            .create::<String, Tag>("Tags")
            .expect("Failed to create region");

        assert!(matches!(
            run(&cache, "SELECT * FROM /Tags").await,
            Err(Error::UnregisteredType(_))
        ));
    }

    #[tokio::test]
    async fn test_query_metadata_and_timeout() {
        let cache = portfolios().await;
        let query = cache
            .query_service()
            .new_query("SELECT * FROM /Portfolios")
            .expect("Failed to parse")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(query.query_string(), "SELECT * FROM /Portfolios");
        assert_eq!(query.execute().await.expect("Failed to query").size(), 3);

        cache.close();
        assert!(matches!(query.execute().await, Err(Error::CacheClosed)));
    }

    #[tokio::test]
    async fn test_query_past_timeout_fails() {
        let cache = portfolios().await;
        let region = cache
            .get_region::<String, Portfolio>("Portfolios")
            .expect("Failed to get region");
        for id in 4..=2000 {
            region
                .put(format!("Key{}", id), Portfolio::new(id, 10))
                .await
                .expect("Failed to put");
        }

        let query = cache
            .query_service()
            .new_query("SELECT DISTINCT * FROM /Portfolios ORDER BY status")
            .expect("Failed to parse")
            .with_timeout(Duration::from_nanos(1));
        assert!(matches!(query.execute().await, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn test_integer_keys_in_numeric_order() {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        cache
            .register_type::<Portfolio>()
            .expect("Failed to register");
        let region = cache
            .create_region_factory()
            .create::<u32, Portfolio>("Portfolios")
            .expect("Failed to create region");
        for id in [10, 1, 2] {
            region
                .put(id as u32, Portfolio::new(id, 10))
                .await
                .expect("Failed to put");
        }

        let ids = run(&cache, "SELECT p.ID FROM /Portfolios p")
            .await
            .expect("Failed to query");
        assert_eq!(ids.to_values(), vec![Value::Int(1), Value::Int(2), Value::Int(10)]);

        let keys = run(&cache, "SELECT * FROM /Portfolios.keys k WHERE k > 1")
            .await
            .expect("Failed to query");
        assert_eq!(keys.to_values(), vec![Value::Int(2), Value::Int(10)]);
    }

    #[tokio::test]
    async fn test_text_keys_stay_strings() {
        let cache = CacheFactory::new().create().expect("Failed to create cache");
        let region = cache
            .create_region_factory()
            .create::<String, Portfolio>("Portfolios")
            .expect("Failed to create region");
        region
            .put("007".to_string(), Portfolio::new(7, 10))
            .await
            .expect("Failed to put");

        let keys = run(&cache, "SELECT * FROM /Portfolios.keySet k WHERE k = '007'")
            .await
            .expect("Failed to query");
        assert_eq!(keys.to_values(), vec![Value::from("007")]);
    }
}

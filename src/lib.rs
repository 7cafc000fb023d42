//! # region-cache
//!
//! An in-process cache organized into named, typed regions, with an OQL-style
//! query language over region contents.
//!
//! ## Features
//!
//! - **Typed Regions:** `Region<K, V>` for any `Display + FromStr` key and any `Cacheable` value
//! - **Queries:** `SELECT ... FROM /Region WHERE ...` with projections, DISTINCT, ORDER BY and bind parameters
//! - **Writers and Loaders:** veto hooks before mutations, read-through loading on misses
//! - **Backend Agnostic:** regions sit on the `CacheBackend` trait; an in-memory backend ships with the crate
//! - **Versioned Storage:** entries are postcard envelopes with a magic header and schema version
//!
//! ## Quick Start
//!
//! ```
//! use region_cache::model::Portfolio;
//! use region_cache::query::Value;
//! use region_cache::CacheFactory;
//!
//! # async fn run() -> region_cache::Result<()> {
//! // 1. Create the cache and a region
//! let cache = CacheFactory::new().create()?;
//! let region = cache
//!     .create_region_factory()
//!     .create::<String, Portfolio>("Portfolios")?;
//!
//! // 2. Register value types so queries can decode them
//! cache.register_type::<Portfolio>()?;
//!
//! // 3. Populate
//! region.put("Key1".to_string(), Portfolio::new(1, 10)).await?;
//! region.put("Key2".to_string(), Portfolio::new(2, 20)).await?;
//!
//! // 4. Query
//! let query = cache
//!     .query_service()
//!     .new_query("SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > $1")?;
//! let rows = query.execute_with_params(&[Value::from(1)]).await?;
//! assert_eq!(rows.size(), 1);
//!
//! // 5. Region shortcuts
//! assert!(region.exists_value("status = 'active'").await?);
//!
//! cache.close();
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod cacheable;
pub mod error;
pub mod key;
pub mod loader;
pub mod model;
pub mod observability;
pub mod query;
pub mod region;
pub mod serialization;
pub mod writer;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cache::{Cache, CacheConfig, CacheFactory};
pub use cacheable::Cacheable;
pub use error::{Error, Result};
pub use loader::CacheLoader;
pub use query::{Query, QueryService, SelectResults, Struct, Value};
pub use region::{Region, RegionFactory};
pub use writer::{CacheWriter, EntryEvent, EntryOperation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

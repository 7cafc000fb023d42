//! Remote query quick-start: populate a region and query it.
//!
//! 1. Create a cache.
//! 2. Create the `Portfolios` region.
//! 3. Register the query value types.
//! 4. Put three portfolios.
//! 5. Run a query that returns a ResultSet.
//! 6. Run a query that returns a StructSet.
//! 7. Run the region shortcut queries.
//! 8. Run a parameterized query.
//! 9. Close the cache.
//!
//! Run with `cargo run --example remote_query`.

use region_cache::model::{Portfolio, Position};
use region_cache::query::{SelectResults, Value};
use region_cache::{Cache, CacheFactory, Result};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .try_init()
        .ok();

    println!("\n=== Region Cache - Remote Query Example ===\n");

    let cache = match CacheFactory::new().name("remote-query").create() {
        Ok(cache) => cache,
        Err(e) => {
            println!("RemoteQuery error: {}", e);
            return;
        }
    };
    println!("Created the cache");

    if let Err(e) = run(&cache).await {
        println!("RemoteQuery error: {}", e);
    }

    cache.close();
    println!("Closed the cache");
}

async fn run(cache: &Cache) -> Result<()> {
    let region = cache
        .create_region_factory()
        .create::<String, Portfolio>("Portfolios")?;
    println!("Created the region programmatically");

    cache.register_type::<Portfolio>()?;
    cache.register_type::<Position>()?;
    println!("Registered the query value types");

    region.put("Key1".to_string(), Portfolio::new(1, 10)).await?;
    region.put("Key2".to_string(), Portfolio::new(2, 20)).await?;
    region.put("Key3".to_string(), Portfolio::new(3, 30)).await?;
    println!("Populated some Portfolio objects");

    let query_service = cache.query_service();
    println!("Got the query service from the cache");

    let results = query_service
        .new_query("SELECT DISTINCT * FROM /Portfolios")?
        .execute()
        .await?;
    println!("ResultSet Query returned {} rows", results.size());

    let results = query_service
        .new_query("SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > 1")?
        .execute()
        .await?;
    println!("StructSet Query returned {} rows", results.size());
    print_struct_rows(&results);

    let results = region.query("ID = 2").await?;
    println!("Region Query returned {} rows", results.size());

    match region.select_value("ID = 3").await? {
        Some(portfolio) => println!("Region selectValue() returned an item:\n {}", portfolio),
        None => println!("Region selectValue() returned no item"),
    }

    let exists = region.exists_value("ID = 4").await?;
    println!("Region existsValue() returned {}", exists);

    let results = query_service
        .new_query("SELECT DISTINCT ID, status FROM /Portfolios WHERE ID > $1 and status=$2")?
        .execute_with_params(&[Value::from(1), Value::from("active")])
        .await?;
    println!("Parameterized Query returned {} rows", results.size());
    print_struct_rows(&results);

    Ok(())
}

fn print_struct_rows(results: &SelectResults) {
    let Some(rows) = results.as_struct_set() else {
        return;
    };
    for (n, row) in rows.iter().enumerate() {
        for (column, (name, value)) in row.fields().enumerate() {
            println!(
                "Row {} Column {} is named {}, value is {}",
                n + 1,
                column + 1,
                name,
                value
            );
        }
    }
}

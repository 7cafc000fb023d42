//! Runs a parsed statement against a region snapshot.

use super::ast::{Projection, RegionCollection, SelectStatement};
use super::eval::Scope;
use super::results::{ResultSet, SelectResults, StructSet};
use super::value::Value;
use crate::backend::CacheBackend;
use crate::cache::CacheInner;
use crate::error::{Error, Result};
use crate::key::{KeyKind, RegionKeyBuilder};
use crate::serialization::is_stale_entry;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// A projected row plus the ORDER BY keys of the element it came from.
struct Row {
    values: Vec<Value>,
    sort_keys: Vec<Value>,
}

/// Fails with `Error::Timeout` once `deadline` has passed.
fn check_deadline(deadline: Option<Instant>, region: &str) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(Error::Timeout(format!(
            "query on /{} ran past its deadline",
            region
        ))),
        _ => Ok(()),
    }
}

/// Evaluate `stmt` over a snapshot of its region.
///
/// In-memory scans never yield to the runtime, so the deadline is checked
/// per element and again before sorting.
pub(crate) async fn execute<B: CacheBackend>(
    cache: &CacheInner<B>,
    stmt: &SelectStatement,
    params: &[Value],
    deadline: Option<Instant>,
) -> Result<SelectResults> {
    cache.ensure_open()?;

    let region = stmt.from.region.as_str();
    let (value_type, key_kind) = cache.region_types(region)?;
    if stmt.from.collection == RegionCollection::Values && !cache.types.is_registered(value_type)
    {
        return Err(Error::UnregisteredType(value_type.to_string()));
    }

    let elements = load_elements(
        cache,
        region,
        value_type,
        key_kind,
        stmt.from.collection,
        deadline,
    )
    .await?;
    debug!(
        "Scanning {} entries of /{} ({:?})",
        elements.len(),
        region,
        stmt.from.collection
    );

    let mut rows = Vec::new();
    for element in &elements {
        check_deadline(deadline, region)?;
        let scope = Scope {
            alias: stmt.from.alias.as_deref(),
            current: element,
            params,
        };

        if let Some(condition) = &stmt.selection {
            if scope.eval_condition(condition)? != Some(true) {
                continue;
            }
        }

        let values = match &stmt.projection {
            Projection::Wildcard | Projection::Count => vec![element.clone()],
            Projection::Items(items) => items
                .iter()
                .map(|item| scope.eval(&item.expr))
                .collect::<Result<Vec<_>>>()?,
        };
        let sort_keys = stmt
            .order_by
            .iter()
            .map(|order| scope.eval(&order.expr))
            .collect::<Result<Vec<_>>>()?;

        rows.push(Row { values, sort_keys });
    }

    if stmt.distinct {
        let mut seen = HashSet::new();
        rows.retain(|row| seen.insert(row.values.clone()));
    }

    if !stmt.order_by.is_empty() {
        check_deadline(deadline, region)?;
        rows.sort_by(|a, b| {
            stmt.order_by
                .iter()
                .zip(a.sort_keys.iter().zip(b.sort_keys.iter()))
                .map(|(order, (x, y))| {
                    let ord = x.total_cmp(y);
                    if order.asc {
                        ord
                    } else {
                        ord.reverse()
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    if let Some(limit) = stmt.limit {
        rows.truncate(limit);
    }

    Ok(match &stmt.projection {
        Projection::Count => ResultSet::new(vec![Value::Int(rows.len() as i64)]).into(),
        Projection::Items(items) if items.len() > 1 => {
            let names: Arc<[String]> = items
                .iter()
                .enumerate()
                .map(|(i, item)| item.output_name(i))
                .collect();
            StructSet::new(names, rows.into_iter().map(|row| row.values).collect()).into()
        }
        _ => ResultSet::new(
            rows.into_iter()
                .filter_map(|row| row.values.into_iter().next())
                .collect(),
        )
        .into(),
    })
}

/// Snapshot of the region as query elements, in region key order.
async fn load_elements<B: CacheBackend>(
    cache: &CacheInner<B>,
    region: &str,
    value_type: &str,
    key_kind: KeyKind,
    collection: RegionCollection,
    deadline: Option<Instant>,
) -> Result<Vec<Value>> {
    let mut entries = cache
        .backend
        .scan_prefix(&RegionKeyBuilder::prefix(region))
        .await?;
    key_kind.sort_entries(region, &mut entries);

    let mut elements = Vec::with_capacity(entries.len());
    for (full_key, bytes) in entries {
        check_deadline(deadline, region)?;
        match collection {
            RegionCollection::Keys => {
                if let Some(key) = RegionKeyBuilder::entry_key(region, &full_key) {
                    elements.push(key_value(key_kind, key));
                }
            }
            RegionCollection::Values => match cache.types.decode(value_type, &bytes) {
                Ok(value) => elements.push(value),
                Err(e) if is_stale_entry(&e) => {
                    warn!("Skipping stale entry {} during query: {}", full_key, e);
                }
                Err(e) => return Err(e),
            },
        }
    }
    Ok(elements)
}

/// A `.keys` element: integer-keyed regions expose integers, others strings.
fn key_value(kind: KeyKind, key: &str) -> Value {
    match kind {
        KeyKind::Integer => key
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(key.to_string())),
        KeyKind::Text => Value::String(key.to_string()),
    }
}

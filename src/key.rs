//! Region key management utilities.

use crate::error::{Error, Result};
use crate::query::is_identifier;
use std::any::TypeId;
use std::fmt::Display;
use std::str::FromStr;

/// Trait for region keys.
///
/// Keys are stored as text (`"{region}:{key}"`), so they must print with
/// `Display` and parse back with `FromStr`.
pub trait RegionKey: Display + FromStr + Clone + Send + Sync + 'static {}

impl<K> RegionKey for K where K: Display + FromStr + Clone + Send + Sync + 'static {}

/// How a region's keys are ordered and exposed to `.keys` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Built-in integer keys: ordered numerically, queried as integers.
    Integer,
    /// Any other key: ordered by its text, queried as a string.
    Text,
}

impl KeyKind {
    pub fn of<K: 'static>() -> Self {
        let key = TypeId::of::<K>();
        let integers = [
            TypeId::of::<i8>(),
            TypeId::of::<i16>(),
            TypeId::of::<i32>(),
            TypeId::of::<i64>(),
            TypeId::of::<i128>(),
            TypeId::of::<isize>(),
            TypeId::of::<u8>(),
            TypeId::of::<u16>(),
            TypeId::of::<u32>(),
            TypeId::of::<u64>(),
            TypeId::of::<usize>(),
        ];
        if integers.contains(&key) {
            KeyKind::Integer
        } else {
            KeyKind::Text
        }
    }

    /// Sort scanned `(backend key, bytes)` pairs of `region` into key order.
    pub fn sort_entries(self, region: &str, entries: &mut [(String, Vec<u8>)]) {
        match self {
            KeyKind::Integer => entries.sort_by_cached_key(|(full_key, _)| {
                RegionKeyBuilder::entry_key(region, full_key)
                    .and_then(|key| key.parse::<i128>().ok())
            }),
            KeyKind::Text => entries.sort_by(|a, b| a.0.cmp(&b.0)),
        }
    }
}

/// Builder for backend keys.
pub struct RegionKeyBuilder;

impl RegionKeyBuilder {
    /// Full backend key for an entry: `"{region}:{key}"`.
    pub fn build(region: &str, key: &dyn Display) -> String {
        format!("{}:{}", region, key)
    }

    /// Prefix shared by every entry of a region.
    pub fn prefix(region: &str) -> String {
        format!("{}:", region)
    }

    /// Strip the region prefix from a backend key.
    pub fn entry_key<'a>(region: &str, full_key: &'a str) -> Option<&'a str> {
        full_key
            .strip_prefix(region)
            .and_then(|rest| rest.strip_prefix(':'))
    }

    /// Parse a backend key back into a typed region key.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeserializationError` if the key is not under `region`
    /// or does not parse as `K`.
    pub fn parse<K: RegionKey>(region: &str, full_key: &str) -> Result<K> {
        let raw = Self::entry_key(region, full_key).ok_or_else(|| {
            Error::DeserializationError(format!(
                "Key {} does not belong to region {}",
                full_key, region
            ))
        })?;
        K::from_str(raw).map_err(|_| {
            Error::DeserializationError(format!(
                "Failed to parse key '{}' from region {}",
                raw, region
            ))
        })
    }

    /// Region names must be non-empty identifiers (a letter or `_`, then
    /// letters, digits or `_`) that are not query keywords, so that
    /// `FROM /name` always parses.
    pub fn validate_region_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::IllegalArgument(
                "Region name must not be empty".to_string(),
            ));
        }
        if !is_identifier(name) {
            return Err(Error::IllegalArgument(format!(
                "Region name '{}' must be an identifier and not a query keyword",
                name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_prefix() {
        assert_eq!(RegionKeyBuilder::build("Portfolios", &"Key1"), "Portfolios:Key1");
        assert_eq!(RegionKeyBuilder::build("Counters", &42), "Counters:42");
        assert_eq!(RegionKeyBuilder::prefix("Portfolios"), "Portfolios:");
    }

    #[test]
    fn test_parse_round_trip() {
        let key: String = RegionKeyBuilder::parse("Portfolios", "Portfolios:Key1").unwrap();
        assert_eq!(key, "Key1");

        let key: u32 = RegionKeyBuilder::parse("Counters", "Counters:42").unwrap();
        assert_eq!(key, 42);

        // Keys may themselves contain the separator
        let key: String = RegionKeyBuilder::parse("R", "R:a:b").unwrap();
        assert_eq!(key, "a:b");
    }

    #[test]
    fn test_parse_errors() {
        assert!(RegionKeyBuilder::parse::<String>("Portfolios", "Positions:Key1").is_err());
        assert!(RegionKeyBuilder::parse::<u32>("Counters", "Counters:abc").is_err());
        assert!(RegionKeyBuilder::entry_key("Port", "Portfolios:Key1").is_none());
    }

    #[test]
    fn test_key_kind() {
        assert_eq!(KeyKind::of::<u32>(), KeyKind::Integer);
        assert_eq!(KeyKind::of::<i64>(), KeyKind::Integer);
        assert_eq!(KeyKind::of::<String>(), KeyKind::Text);
        assert_eq!(KeyKind::of::<f64>(), KeyKind::Text);
    }

    #[test]
    fn test_sort_entries_by_key_kind() {
        let scanned = || -> Vec<(String, Vec<u8>)> {
            ["R:1", "R:10", "R:2", "R:-3"]
                .iter()
                .map(|k| (k.to_string(), Vec::new()))
                .collect()
        };
        let keys = |entries: &[(String, Vec<u8>)]| -> Vec<String> {
            entries.iter().map(|(k, _)| k.clone()).collect()
        };

        let mut numeric = scanned();
        KeyKind::Integer.sort_entries("R", &mut numeric);
        assert_eq!(keys(&numeric), ["R:-3", "R:1", "R:2", "R:10"]);

        let mut text = scanned();
        KeyKind::Text.sort_entries("R", &mut text);
        assert_eq!(keys(&text), ["R:-3", "R:1", "R:10", "R:2"]);
    }

    #[test]
    fn test_validate_region_name() {
        assert!(RegionKeyBuilder::validate_region_name("Portfolios").is_ok());
        assert!(RegionKeyBuilder::validate_region_name("_trades2024").is_ok());
        for bad in ["", "a/b", "a:b", "my-region", "2024", "Order", "select"] {
            assert!(matches!(
                RegionKeyBuilder::validate_region_name(bad),
                Err(Error::IllegalArgument(_))
            ));
        }
    }
}

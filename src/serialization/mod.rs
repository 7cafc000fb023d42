//! Postcard-based entry serialization with versioned envelopes.
//!
//! Every region entry is stored in this format:
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (4 bytes)│POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "RGNC"              u32 (varint)       postcard::to_allocvec(T)
//! ```
//!
//! Postcard is not self-describing, so the query engine cannot look inside an
//! entry without knowing its type. The [`TypeRegistry`] closes that gap: it
//! maps a registered type name to a decoder that turns stored bytes into a
//! query [`Value`](crate::query::Value).
//!
//! # Example
//!
//! ```rust
//! use region_cache::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Position {
//!     sec_id: String,
//!     qty: i64,
//! }
//!
//! # fn main() -> region_cache::Result<()> {
//! let position = Position { sec_id: "SUN".to_string(), qty: 100 };
//! let bytes = serialize_for_cache(&position)?;
//! let decoded: Position = deserialize_from_cache(&bytes)?;
//! assert_eq!(position, decoded);
//! # Ok(())
//! # }
//! ```

mod registry;

pub use registry::TypeRegistry;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for region entries: b"RGNC"
pub const CACHE_MAGIC: [u8; 4] = *b"RGNC";

/// Current schema version.
///
/// Increment when a stored type changes shape (fields added, removed,
/// reordered or retyped). Entries written under an older version are evicted
/// on read instead of being misdecoded.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope wrapped around every stored entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Magic header: must be b"RGNC"
    pub magic: [u8; 4],
    /// Schema version: must match CURRENT_SCHEMA_VERSION
    pub version: u32,
    /// The stored value
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Create a new envelope with current magic and version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Serialize a value with envelope for storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let envelope = CacheEnvelope::new(value);
    postcard::to_allocvec(&envelope).map_err(|e| {
        log::error!("Entry serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Deserialize a value from storage, validating magic and version.
///
/// # Errors
///
/// - `Error::InvalidCacheEntry`: Invalid magic header
/// - `Error::VersionMismatch`: Schema version mismatch
/// - `Error::DeserializationError`: Corrupted Postcard payload
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        log::error!("Entry deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    check_envelope(envelope.magic, envelope.version)?;
    Ok(envelope.payload)
}

/// Validate only the magic header and schema version of a stored entry.
///
/// # Errors
///
/// Same as [`deserialize_from_cache`], without decoding the payload.
pub(crate) fn check_header(bytes: &[u8]) -> Result<()> {
    let ((magic, version), _) = postcard::take_from_bytes::<([u8; 4], u32)>(bytes)
        .map_err(|e| Error::DeserializationError(e.to_string()))?;
    check_envelope(magic, version)
}

fn check_envelope(magic: [u8; 4], version: u32) -> Result<()> {
    if magic != CACHE_MAGIC {
        log::warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC,
            magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, magic
        )));
    }

    if version != CURRENT_SCHEMA_VERSION {
        log::warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION,
            version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: version,
        });
    }

    Ok(())
}

/// True for errors that mean "this stored entry is stale or foreign".
///
/// Regions evict such entries and treat them as misses.
pub(crate) fn is_stale_entry(err: &Error) -> bool {
    matches!(
        err,
        Error::InvalidCacheEntry(_) | Error::VersionMismatch { .. }
    )
}

//! Core trait that every value stored in a region must implement.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Trait for values stored in a region.
///
/// `type_name()` identifies the type to the [`TypeRegistry`](crate::serialization::TypeRegistry)
/// so queries can decode stored entries. Field names seen by queries are the
/// serde field names, so `#[serde(rename = "ID")]` makes a field queryable as
/// `ID`.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use region_cache::Cacheable;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Trade {
///     #[serde(rename = "ID")]
///     pub id: i32,
///     pub symbol: String,
/// }
///
/// impl Cacheable for Trade {
///     fn type_name() -> &'static str {
///         "Trade"
///     }
/// }
/// ```
pub trait Cacheable: Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone + 'static {
    /// Stable name for this type, used to match regions with registered decoders.
    fn type_name() -> &'static str;

    /// Serialize for storage in a versioned postcard envelope.
    ///
    /// See `crate::serialization` for the format.
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize from storage, validating magic header and schema version.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: Bad magic or corrupted envelope
    /// - `Error::VersionMismatch`: Schema version changed
    /// - `Error::DeserializationError`: Corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: Validate a value after it is read back from storage.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

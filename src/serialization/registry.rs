//! Registry of value types the query engine can decode.

use crate::cacheable::Cacheable;
use crate::error::{Error, Result};
use crate::query::Value;
use dashmap::DashMap;

/// Turns stored entry bytes into a query value.
type DecodeFn = fn(&[u8]) -> Result<Value>;

fn decode_value<T: Cacheable>(bytes: &[u8]) -> Result<Value> {
    let value = T::deserialize_from_cache(bytes)?;
    Value::from_serializable(&value)
}

/// Maps `Cacheable::type_name()` to the decoder for that type.
///
/// A region can be written without registering its value type, but queries
/// over it fail with `Error::UnregisteredType` until the type is registered.
#[derive(Default)]
pub struct TypeRegistry {
    decoders: DashMap<&'static str, DecodeFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T`. Registering the same type again is a no-op.
    pub fn register<T: Cacheable>(&self) {
        if self
            .decoders
            .insert(T::type_name(), decode_value::<T>)
            .is_none()
        {
            debug!("✓ Registered type {}", T::type_name());
        }
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode stored bytes of the named type into a query value.
    ///
    /// # Errors
    ///
    /// - `Error::UnregisteredType` if `type_name` was never registered
    /// - Any envelope or payload error from deserialization
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Value> {
        let decoder = *self
            .decoders
            .get(type_name)
            .ok_or_else(|| Error::UnregisteredType(type_name.to_string()))?;
        decoder(bytes)
    }
}

//! Error types for the region cache.

use std::fmt;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for region, query and serialization operations.
///
/// Every public operation returns `Result<T>`. The variants separate storage
/// failures from query failures so callers can decide what is recoverable.
#[derive(Debug, Clone)]
pub enum Error {
    /// Serialization failed when converting a value to cache bytes.
    ///
    /// Common causes:
    /// - Value contains non-serializable types
    /// - Postcard codec error
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a value.
    ///
    /// Also raised when a region key cannot be parsed back from its
    /// stored form.
    DeserializationError(String),

    /// Validation failed: `Cacheable::validate()` rejected a stored value.
    ValidationError(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    ///
    /// Returned when the magic header is not `b"RGNC"`.
    ///
    /// **Recovery:** Regions evict such entries on read.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and stored data.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from stored entry)
        found: u32,
    },

    /// Backend storage error.
    BackendError(String),

    /// A `CacheLoader` failed to produce a value on a cache miss.
    LoaderError(String),

    /// Operation exceeded configured timeout threshold.
    ///
    /// Raised by queries that run longer than their timeout.
    Timeout(String),

    /// Configuration error while building a cache or region.
    ConfigError(String),

    /// Feature not implemented by the active backend.
    NotImplemented(String),

    /// The cache has been closed; no further operations are allowed.
    CacheClosed,

    /// A region with this name already exists.
    RegionExists(String),

    /// No region with this name exists.
    RegionNotFound(String),

    /// The region exists but holds a different value type.
    RegionTypeMismatch {
        /// Region name
        region: String,
        /// Value type requested by the caller
        expected: String,
        /// Value type the region was created with
        found: String,
    },

    /// A query touched a region whose value type was never registered.
    ///
    /// **Recovery:** Call `Cache::register_type::<T>()` before querying.
    UnregisteredType(String),

    /// A `CacheWriter` vetoed the operation.
    CacheWriterVetoed(String),

    /// The query string could not be parsed.
    QuerySyntax(String),

    /// The query parsed but could not be executed.
    QueryExecution(String),

    /// Operands of a query expression have incompatible types.
    TypeMismatch(String),

    /// An argument was rejected (empty region name, bad key, ...).
    IllegalArgument(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::InvalidCacheEntry(msg) => write!(f, "Invalid cache entry: {}", msg),
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::LoaderError(msg) => write!(f, "Loader error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::NotImplemented(msg) => write!(f, "Not implemented: {}", msg),
            Error::CacheClosed => write!(f, "Cache has been closed"),
            Error::RegionExists(name) => write!(f, "Region already exists: {}", name),
            Error::RegionNotFound(name) => write!(f, "Region not found: {}", name),
            Error::RegionTypeMismatch {
                region,
                expected,
                found,
            } => write!(
                f,
                "Region {} holds {} values, not {}",
                region, found, expected
            ),
            Error::UnregisteredType(name) => {
                write!(f, "Type not registered for querying: {}", name)
            }
            Error::CacheWriterVetoed(msg) => write!(f, "Cache writer vetoed: {}", msg),
            Error::QuerySyntax(msg) => write!(f, "Query syntax error: {}", msg),
            Error::QueryExecution(msg) => write!(f, "Query execution error: {}", msg),
            Error::TypeMismatch(msg) => write!(f, "Type mismatch: {}", msg),
            Error::IllegalArgument(msg) => write!(f, "Illegal argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::BackendError(e.to_string())
        } else if e.is_data() || e.is_syntax() || e.is_eof() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::BackendError(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(e.to_string())
    }
}

//! Record and capability types for the storage abstraction.

use time::OffsetDateTime;

/// A versioned record read back from a storage backend.
///
/// The version is an opaque monotonically increasing counter scoped to one
/// `(context, key)` pair. It is the token callers pass back to
/// `update_with_version`/`delete_with_version` for optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRecord {
    /// The stored value.
    pub value: String,
    /// Version of the record at read time.
    pub version: u64,
    /// Expiration of the record, if any.
    pub expiration: Option<OffsetDateTime>,
}

impl StorageRecord {
    /// Creates a new record.
    #[must_use]
    pub fn new(value: impl Into<String>, version: u64, expiration: Option<OffsetDateTime>) -> Self {
        Self {
            value: value.into(),
            version,
            expiration,
        }
    }

    /// Returns `true` if the record has expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }
}

/// Size limits declared by a storage backend.
///
/// Callers must check these before relying on size-sensitive features:
/// session ids must fit in a context name, secondary keys in a key, and
/// serialized session records in a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapabilities {
    /// Maximum context name length in bytes.
    pub context_size: usize,
    /// Maximum key length in bytes.
    pub key_size: usize,
    /// Maximum value length in bytes.
    pub value_size: usize,
}

impl StorageCapabilities {
    /// Capabilities of a backend with no practical limits.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            context_size: usize::MAX,
            key_size: usize::MAX,
            value_size: usize::MAX,
        }
    }
}

impl Default for StorageCapabilities {
    fn default() -> Self {
        Self::unbounded()
    }
}

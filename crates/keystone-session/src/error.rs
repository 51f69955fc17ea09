//! Session layer error taxonomy.
//!
//! Two families, split by data path:
//!
//! - [`SessionError`] - write-path and lifecycle failures (create, destroy,
//!   sub-record maintenance, secondary indexing)
//! - [`ResolverError`] - read-path failures (criteria dispatch, primary and
//!   secondary lookup)
//!
//! Version mismatches never appear here: they are retried internally and
//! only surface, after the bounded retry budget is spent, as the distinct
//! [`SessionError::RetriesExhausted`] variant so operators can tell
//! contention from backend unreliability.

use keystone_storage::StorageError;

/// Write-path and lifecycle failures.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A freshly generated session id collided with an existing record.
    #[error("Duplicate session id: {id}")]
    DuplicateSessionId {
        /// The colliding id.
        id: String,
    },

    /// Address binding is enabled but the request carried no client address.
    #[error("Client address required but not available")]
    MissingClientAddress,

    /// The generated session id exceeds the backend's context size limit.
    #[error("Session id of {len} bytes exceeds backend context limit of {max}")]
    SessionIdTooLong {
        /// Length of the generated id.
        len: usize,
        /// Backend context size limit.
        max: usize,
    },

    /// The bounded optimistic-retry budget was exhausted by contention.
    #[error("Exhausted {attempts} update attempts due to version conflicts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: usize,
    },

    /// An entity could not be encoded for storage.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the codec failure.
        message: String,
    },

    /// Invalid configuration detected at construction time.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this failure came from the storage backend itself
    /// and is therefore eligible for masking. Codec failures wrapped in a
    /// storage error are not.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Backend { .. }))
    }

    /// Returns `true` if this is the bounded-retry exhaustion failure.
    #[must_use]
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }
}

/// Read-path failures.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// The criteria combination is not supported by this resolver.
    #[error("Unsupported criteria: {message}")]
    UnsupportedCriteria {
        /// Description of what was asked for.
        message: String,
    },

    /// A service lookup was attempted with secondary indexing disabled.
    #[error("Secondary indexing is not enabled")]
    SecondaryIndexingDisabled,

    /// A stored record could not be decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the codec failure.
        message: String,
    },

    /// The storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ResolverError {
    /// Creates a new `UnsupportedCriteria` error.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedCriteria {
            message: message.into(),
        }
    }

    /// Creates a new `Serialization` error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this failure came from the storage backend itself
    /// and is therefore eligible for masking. Codec failures wrapped in a
    /// storage error are not.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(StorageError::Backend { .. }))
    }
}

//! The storage service trait all backends must implement.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::types::{StorageCapabilities, StorageRecord};

/// A generic versioned key/value store addressed by `(context, key)`.
///
/// Implementations must be thread-safe (`Send + Sync`). Values are opaque
/// strings; codecs live with the caller. Expired records must behave as
/// absent for every operation, whether or not the backend physically
/// removes them eagerly.
///
/// # Concurrency
///
/// The only coordination offered is per-record optimistic versioning.
/// There are no transactions; callers that need multi-record consistency
/// must tolerate partial states (the session layer does, by design).
///
/// # Example
///
/// ```ignore
/// use keystone_storage::{StorageService, StorageError};
///
/// async fn bump(storage: &dyn StorageService) -> Result<(), StorageError> {
///     if let Some(rec) = storage.read("ctx", "key").await? {
///         storage
///             .update_with_version(rec.version, "ctx", "key", "new", rec.expiration)
///             .await?;
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Returns the size limits of this backend.
    fn capabilities(&self) -> StorageCapabilities;

    /// Creates a new record.
    ///
    /// Returns `false` if a live record already exists under
    /// `(context, key)`; an expired record is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError>;

    /// Reads a record.
    ///
    /// Returns `None` if the record does not exist or has expired.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn read(&self, context: &str, key: &str) -> Result<Option<StorageRecord>, StorageError>;

    /// Updates a record unconditionally (last writer wins).
    ///
    /// Returns `false` if no live record exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError>;

    /// Updates a record only if its current version matches `version`.
    ///
    /// Returns the new version on success, or `None` when the record is
    /// absent or the version does not match (the caller lost a race and
    /// should re-read and retry).
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn update_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<Option<u64>, StorageError>;

    /// Replaces a record's expiration without touching its value or version.
    ///
    /// Returns `false` if no live record exists.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn update_expiration(
        &self,
        context: &str,
        key: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError>;

    /// Deletes a record unconditionally.
    ///
    /// Returns `false` if no live record existed.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError>;

    /// Deletes a record only if its current version matches `version`.
    ///
    /// Returns `false` when the record is absent or the version does not
    /// match.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
    ) -> Result<bool, StorageError>;

    /// Removes every record under a context.
    ///
    /// Not atomic across records: concurrent readers may observe a
    /// partially deleted context.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn delete_context(&self, context: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that StorageService is object-safe
    fn _assert_storage_object_safe(_: &dyn StorageService) {}
}

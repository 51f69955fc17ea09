//! In-memory storage backend with per-record versioning and TTL.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use keystone_storage::{StorageCapabilities, StorageError, StorageRecord, StorageService};

#[derive(Debug, Clone)]
struct MemoryRecord {
    value: String,
    version: u64,
    expiration: Option<OffsetDateTime>,
}

impl MemoryRecord {
    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiration.is_some_and(|exp| exp <= now)
    }

    fn to_storage_record(&self) -> StorageRecord {
        StorageRecord::new(self.value.clone(), self.version, self.expiration)
    }
}

type ContextMap = HashMap<String, HashMap<String, MemoryRecord>>;

/// In-memory [`StorageService`] implementation.
///
/// A single `RwLock` over a two-level map keeps the compare-and-swap
/// operations trivially atomic; contention is not a concern at the scale
/// this backend targets.
#[derive(Debug)]
pub struct MemoryStorage {
    data: Arc<RwLock<ContextMap>>,
    capabilities: StorageCapabilities,
}

impl MemoryStorage {
    /// Creates a new storage with effectively unlimited sizes.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(StorageCapabilities::unbounded())
    }

    /// Creates a new storage with the given declared size limits.
    ///
    /// The limits are advertised but not enforced; tests use small limits
    /// to exercise callers' capability checks and truncation fallbacks.
    #[must_use]
    pub fn with_capabilities(capabilities: StorageCapabilities) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            capabilities,
        }
    }

    /// Removes every expired record and every empty context.
    ///
    /// Returns the number of records removed.
    pub async fn reap_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let mut removed = 0;
        for records in data.values_mut() {
            let before = records.len();
            records.retain(|_, rec| !rec.is_expired(now));
            removed += before - records.len();
        }
        data.retain(|_, records| !records.is_empty());
        if removed > 0 {
            tracing::debug!(removed, "reaped expired records");
        }
        removed
    }

    /// Returns the number of live records across all contexts.
    pub async fn record_count(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let data = self.data.read().await;
        data.values()
            .flat_map(|records| records.values())
            .filter(|rec| !rec.is_expired(now))
            .count()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageService for MemoryStorage {
    fn capabilities(&self) -> StorageCapabilities {
        self.capabilities
    }

    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let records = data.entry(context.to_string()).or_default();
        match records.get(key) {
            Some(existing) if !existing.is_expired(now) => Ok(false),
            _ => {
                records.insert(
                    key.to_string(),
                    MemoryRecord {
                        value: value.to_string(),
                        version: 1,
                        expiration,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn read(&self, context: &str, key: &str) -> Result<Option<StorageRecord>, StorageError> {
        let now = OffsetDateTime::now_utc();
        let data = self.data.read().await;
        Ok(data
            .get(context)
            .and_then(|records| records.get(key))
            .filter(|rec| !rec.is_expired(now))
            .map(MemoryRecord::to_storage_record))
    }

    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        match data.get_mut(context).and_then(|records| records.get_mut(key)) {
            Some(rec) if !rec.is_expired(now) => {
                rec.value = value.to_string();
                rec.version += 1;
                rec.expiration = expiration;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
        value: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<Option<u64>, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        match data.get_mut(context).and_then(|records| records.get_mut(key)) {
            Some(rec) if !rec.is_expired(now) => {
                if rec.version != version {
                    return Ok(None);
                }
                rec.value = value.to_string();
                rec.version += 1;
                rec.expiration = expiration;
                Ok(Some(rec.version))
            }
            _ => Ok(None),
        }
    }

    async fn update_expiration(
        &self,
        context: &str,
        key: &str,
        expiration: Option<OffsetDateTime>,
    ) -> Result<bool, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        match data.get_mut(context).and_then(|records| records.get_mut(key)) {
            Some(rec) if !rec.is_expired(now) => {
                rec.expiration = expiration;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let Some(records) = data.get_mut(context) else {
            return Ok(false);
        };
        match records.get(key) {
            Some(rec) if !rec.is_expired(now) => {
                records.remove(key);
                Ok(true)
            }
            Some(_) => {
                // Expired: physically remove, but report absent.
                records.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete_with_version(
        &self,
        version: u64,
        context: &str,
        key: &str,
    ) -> Result<bool, StorageError> {
        let now = OffsetDateTime::now_utc();
        let mut data = self.data.write().await;
        let Some(records) = data.get_mut(context) else {
            return Ok(false);
        };
        match records.get(key) {
            Some(rec) if !rec.is_expired(now) && rec.version == version => {
                records.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_context(&self, context: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.remove(context);
        Ok(())
    }
}

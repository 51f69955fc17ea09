//! Session layer configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// Configuration for the storage-backed session service.
///
/// All settings are fixed at construction; there is no runtime mutation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Inactivity window after which a session logically times out.
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Duration,

    /// Grace period added to storage-record TTLs so records survive long
    /// enough for logout processing. Does not relax the logical timeout.
    #[serde(with = "humantime_serde")]
    pub slop: Duration,

    /// Name of the session-identifying cookie.
    pub cookie_name: String,

    /// Bind sessions to the client address and reject mismatches.
    pub consistent_address: bool,

    /// Persist SP sessions on the master session.
    pub track_sp_sessions: bool,

    /// Maintain the `(service id, secondary key)` index for logout.
    /// Requires `track_sp_sessions`.
    pub secondary_indexing: bool,

    /// Degrade on storage failures (log and continue) instead of raising
    /// them to the caller. Applies to backend errors and retry exhaustion
    /// on the write and primary-read paths; secondary-index GC is
    /// best-effort regardless.
    pub mask_storage_failure: bool,

    /// Bound on optimistic-update retries for contended records.
    pub max_update_attempts: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(60 * 60),
            slop: Duration::ZERO,
            cookie_name: "keystone_session".to_string(),
            consistent_address: true,
            track_sp_sessions: true,
            secondary_indexing: true,
            mask_storage_failure: false,
            max_update_attempts: 10,
        }
    }
}

impl SessionConfig {
    /// Validates internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Configuration` if settings contradict each
    /// other or are out of range.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_update_attempts == 0 {
            return Err(SessionError::configuration(
                "maxUpdateAttempts must be at least 1",
            ));
        }
        if self.secondary_indexing && !self.track_sp_sessions {
            return Err(SessionError::configuration(
                "secondaryIndexing requires trackSpSessions",
            ));
        }
        if self.cookie_name.is_empty() {
            return Err(SessionError::configuration("cookieName must not be empty"));
        }
        Ok(())
    }
}

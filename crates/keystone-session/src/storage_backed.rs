//! Storage-backed session manager and resolver.
//!
//! # Storage layout
//!
//! One storage *context* per session, named by the session id. Inside it:
//!
//! - the master record under the fixed key `"_session"`, holding
//!   identity/activity state and the cross-reference lists of sub-record
//!   keys
//! - one record per authentication flow id, holding that flow's
//!   [`AuthenticationResult`]
//! - one record per service id, holding that relying party's
//!   [`SPSession`](crate::types::SPSession)
//!
//! Each sub-record carries its own TTL, and `delete_context` discards the
//! whole session in one (non-atomic but sufficient) call.
//!
//! Secondary-index records live outside session contexts, under
//! `(context = service id, key = secondary key)`, and hold a JSON list of
//! session ids. They are the one place where independent writers race on
//! the same record; every write there goes through a bounded
//! optimistic-retry loop.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, warn};

use keystone_storage::StorageService;

use crate::config::SessionConfig;
use crate::error::{ResolverError, SessionError};
use crate::id::generate_session_id;
use crate::manager::SessionManager;
use crate::request::RequestContext;
use crate::resolver::{SessionCriteria, SessionResolver};
use crate::serialize::{
    SPSessionCodecRegistry, SessionMasterRecord, decode_index_list, encode_index_list,
};
use crate::types::{AuthenticationResult, IdPSession, SPSession};

/// Fixed key of the master record within a session context.
const MASTER_RECORD_KEY: &str = "_session";

/// Session manager/resolver persisting to a [`StorageService`].
///
/// All correctness comes from the backend's per-record versioning and
/// TTLs; there are no in-process locks over sessions and no transactions.
pub struct StorageBackedSessionService {
    storage: Arc<dyn StorageService>,
    config: SessionConfig,
    codecs: SPSessionCodecRegistry,
}

impl std::fmt::Debug for StorageBackedSessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageBackedSessionService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StorageBackedSessionService {
    /// Creates a service over a storage backend with the default codec
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Configuration` if the configuration is
    /// inconsistent or the backend's declared sizes cannot hold a session
    /// id.
    pub fn new(
        storage: Arc<dyn StorageService>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        Self::with_codecs(storage, config, SPSessionCodecRegistry::default())
    }

    /// Creates a service with an explicit codec registry.
    ///
    /// # Errors
    ///
    /// As for [`new`](Self::new).
    pub fn with_codecs(
        storage: Arc<dyn StorageService>,
        config: SessionConfig,
        codecs: SPSessionCodecRegistry,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let caps = storage.capabilities();
        if caps.context_size < GENERATED_ID_LEN {
            return Err(SessionError::configuration(format!(
                "backend context limit of {} cannot hold a {GENERATED_ID_LEN}-byte session id",
                caps.context_size
            )));
        }
        if caps.key_size < MASTER_RECORD_KEY.len() {
            return Err(SessionError::configuration(
                "backend key limit cannot hold the master record key",
            ));
        }
        if config.track_sp_sessions && caps.value_size < MIN_RECORD_VALUE_SIZE {
            return Err(SessionError::configuration(format!(
                "backend value limit of {} cannot hold serialized session records",
                caps.value_size
            )));
        }
        Ok(Self {
            storage,
            config,
            codecs,
        })
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Criteria for the session referenced by a request's cookie, using
    /// the configured cookie name.
    #[must_use]
    pub fn criteria_for_request(&self, ctx: &RequestContext) -> SessionCriteria {
        SessionCriteria::from_request(&self.config.cookie_name, ctx)
    }

    /// Applies the masking policy to a write-path outcome.
    ///
    /// Backend failures and retry exhaustion are degraded to a warning
    /// when masking is on; exhaustion gets its own message so operators
    /// can still tell contention from backend unreliability. Codec
    /// failures always propagate.
    fn mask_write_failure(
        &self,
        outcome: Result<(), SessionError>,
        operation: &str,
    ) -> Result<(), SessionError> {
        match outcome {
            Err(e) if self.config.mask_storage_failure && e.is_retries_exhausted() => {
                warn!(operation, error = %e, "masking retry exhaustion");
                Ok(())
            }
            Err(e) if self.config.mask_storage_failure && e.is_storage() => {
                warn!(operation, error = %e, "masking storage failure");
                Ok(())
            }
            other => other,
        }
    }

    fn retention_expiration(&self, last_activity: OffsetDateTime) -> OffsetDateTime {
        last_activity + self.config.inactivity_timeout + self.config.slop
    }

    fn master_record_of(session: &IdPSession) -> SessionMasterRecord {
        SessionMasterRecord {
            principal_name: session.principal_name().to_string(),
            creation_instant: session.creation_instant(),
            last_activity_instant: session.last_activity_instant(),
            address: session.address(),
            flow_ids: session.authentication_results().keys().cloned().collect(),
            service_ids: session.sp_sessions().keys().cloned().collect(),
        }
    }

    /// Persists the session's activity timestamp, extending storage
    /// retention.
    ///
    /// Uses the unconditional `update`: racing touches are last-writer-wins,
    /// which is harmless because activity instants only move forward and
    /// losing one merely shortens retention slightly. A master record that
    /// has disappeared (concurrent destroy or TTL expiry) is left absent,
    /// never recreated by a late touch.
    ///
    /// # Errors
    ///
    /// Returns storage errors per the masking configuration.
    pub async fn touch_activity(&self, session: &mut IdPSession) -> Result<(), SessionError> {
        let now = OffsetDateTime::now_utc();
        session.touch(now);
        let record = Self::master_record_of(session);
        let value = match record.encode() {
            Ok(value) => value,
            Err(e) => return Err(e.into()),
        };
        let expiration = self.retention_expiration(session.last_activity_instant());
        let outcome = match self
            .storage
            .update(session.id(), MASTER_RECORD_KEY, &value, Some(expiration))
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(
                    session_id = session.id(),
                    "master record gone, activity not persisted"
                );
                Ok(())
            }
            Err(e) => Err(SessionError::from(e)),
        };
        self.mask_write_failure(outcome, "activity update")
    }

    /// Appends an authentication result, replacing any prior result for
    /// the same flow, and persists it as that flow's sub-record.
    ///
    /// # Errors
    ///
    /// Returns storage errors per the masking configuration and
    /// `SessionError::RetriesExhausted` on sustained contention.
    pub async fn add_authentication_result(
        &self,
        session: &mut IdPSession,
        result: AuthenticationResult,
    ) -> Result<(), SessionError> {
        let value = serde_json::to_string(&result)
            .map_err(|e| SessionError::serialization(e.to_string()))?;
        let flow_id = result.flow_id.clone();
        session.put_authentication_result(result);

        let outcome = self
            .write_session_records(session, &flow_id, &value)
            .await;
        self.mask_write_failure(outcome, "authentication result write")
    }

    /// Appends an SP session, replacing any prior one for the same relying
    /// party, persists it, and maintains the secondary index when enabled.
    ///
    /// # Errors
    ///
    /// Returns storage errors and `SessionError::RetriesExhausted` on
    /// sustained contention, both per the masking configuration.
    pub async fn add_sp_session(
        &self,
        session: &mut IdPSession,
        sp_session: SPSession,
    ) -> Result<(), SessionError> {
        if !self.config.track_sp_sessions {
            debug!("SP session tracking disabled, nothing to record");
            return Ok(());
        }

        let value = self
            .codecs
            .encode(&sp_session)
            .map_err(SessionError::from)?;
        let service_id = sp_session.service_id().to_string();
        session.put_sp_session(sp_session.clone());

        let outcome = self
            .write_session_records(session, &service_id, &value)
            .await;
        self.mask_write_failure(outcome, "SP session write")?;

        if self.config.secondary_indexing && sp_session.secondary_key().is_some() {
            let outcome = self.index_by_sp_session(session.id(), &sp_session).await;
            self.mask_write_failure(outcome, "secondary index update")?;
        }
        Ok(())
    }

    /// Writes one sub-record and folds its key into the master record's
    /// cross-reference lists, all under the session's context.
    async fn write_session_records(
        &self,
        session: &IdPSession,
        sub_key: &str,
        sub_value: &str,
    ) -> Result<(), SessionError> {
        let caps = self.storage.capabilities();
        let key = truncate_to(sub_key, caps.key_size, "sub-record key");
        let expiration = self.retention_expiration(session.last_activity_instant());

        self.upsert_record(session.id(), key, sub_value, expiration)
            .await?;
        self.persist_master(session).await
    }

    /// Rewrites the master record from the in-memory session state using
    /// a bounded read-modify-CAS loop, falling back to create if the
    /// record is missing.
    async fn persist_master(&self, session: &IdPSession) -> Result<(), SessionError> {
        let record = Self::master_record_of(session);
        let value = record.encode()?;
        let expiration = self.retention_expiration(session.last_activity_instant());
        self.upsert_record(session.id(), MASTER_RECORD_KEY, &value, expiration)
            .await
    }

    /// Creates or replaces a record under a session context with a bounded
    /// optimistic loop. Contention here is rare (one client per session)
    /// but the bound still holds.
    async fn upsert_record(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expiration: OffsetDateTime,
    ) -> Result<(), SessionError> {
        let attempts = self.config.max_update_attempts;
        for _ in 0..attempts {
            match self.storage.read(context, key).await? {
                Some(rec) => {
                    if self
                        .storage
                        .update_with_version(rec.version, context, key, value, Some(expiration))
                        .await?
                        .is_some()
                    {
                        return Ok(());
                    }
                }
                None => {
                    if self
                        .storage
                        .create(context, key, value, Some(expiration))
                        .await?
                    {
                        return Ok(());
                    }
                }
            }
        }
        Err(SessionError::RetriesExhausted { attempts })
    }

    /// Inserts a session id into the `(service id, secondary key)` index
    /// record, creating the record if needed.
    ///
    /// This is the one path where independent writers (different sessions
    /// federating to the same relying party under the same key) race on a
    /// shared record, so every step runs inside an explicit bounded retry
    /// loop: a lost create race retries as an update, a lost update race
    /// re-reads and retries.
    async fn index_by_sp_session(
        &self,
        session_id: &str,
        sp_session: &SPSession,
    ) -> Result<(), SessionError> {
        let Some(secondary_key) = sp_session.secondary_key() else {
            return Ok(());
        };
        let caps = self.storage.capabilities();
        let context = truncate_to(sp_session.service_id(), caps.context_size, "service id");
        let key = truncate_to(secondary_key, caps.key_size, "secondary key");
        let sp_retention = sp_session.expiration_instant() + self.config.slop;

        let attempts = self.config.max_update_attempts;
        for _ in 0..attempts {
            match self.storage.read(context, key).await? {
                Some(rec) => {
                    let mut ids = match decode_index_list(&rec.value) {
                        Ok(ids) => ids,
                        Err(e) => {
                            warn!(context, error = %e, "undecodable index record, rebuilding");
                            Vec::new()
                        }
                    };
                    if ids.iter().any(|id| id == session_id) {
                        return Ok(());
                    }
                    ids.push(session_id.to_string());
                    let value = encode_index_list(&ids)?;
                    // Never shorten the record's life on behalf of one
                    // SP session; other sessions in the list may need it
                    // longer.
                    let expiration = rec.expiration.map(|cur| cur.max(sp_retention));
                    if self
                        .storage
                        .update_with_version(rec.version, context, key, &value, expiration)
                        .await?
                        .is_some()
                    {
                        return Ok(());
                    }
                    debug!(context, "lost index update race, retrying");
                }
                None => {
                    let value = encode_index_list(&[session_id.to_string()])?;
                    if self
                        .storage
                        .create(context, key, &value, Some(sp_retention))
                        .await?
                    {
                        return Ok(());
                    }
                    debug!(context, "lost index create race, retrying as update");
                }
            }
        }
        Err(SessionError::RetriesExhausted { attempts })
    }

    /// Loads a full session (master plus sub-records) by id.
    async fn load_session(&self, id: &str) -> Result<Option<IdPSession>, ResolverError> {
        let Some(master) = self.storage.read(id, MASTER_RECORD_KEY).await? else {
            return Ok(None);
        };
        let record = SessionMasterRecord::decode(&master.value)
            .map_err(|e| ResolverError::serialization(e.to_string()))?;

        let caps = self.storage.capabilities();
        let mut results = std::collections::HashMap::new();
        for flow_id in &record.flow_ids {
            let key = truncate_to(flow_id, caps.key_size, "sub-record key");
            match self.storage.read(id, key).await? {
                Some(rec) => match serde_json::from_str::<AuthenticationResult>(&rec.value) {
                    Ok(result) => {
                        results.insert(flow_id.clone(), result);
                    }
                    Err(e) => {
                        warn!(session_id = id, flow_id, error = %e, "skipping undecodable authentication result");
                    }
                },
                // Expired independently of the session.
                None => debug!(session_id = id, flow_id, "flow record absent"),
            }
        }

        let mut sp_sessions = std::collections::HashMap::new();
        for service_id in &record.service_ids {
            let key = truncate_to(service_id, caps.key_size, "sub-record key");
            match self.storage.read(id, key).await? {
                Some(rec) => match self.codecs.decode(&rec.value) {
                    Ok(sp) => {
                        sp_sessions.insert(service_id.clone(), sp);
                    }
                    Err(e) => {
                        warn!(session_id = id, service_id, error = %e, "skipping undecodable SP session");
                    }
                },
                None => debug!(session_id = id, service_id, "SP record absent"),
            }
        }

        Ok(Some(IdPSession::from_parts(
            id.to_string(),
            record.principal_name,
            record.creation_instant,
            record.last_activity_instant,
            record.address,
            results,
            sp_sessions,
        )))
    }

    /// Primary lookup with masking applied.
    async fn resolve_primary(&self, id: &str) -> Result<Vec<IdPSession>, ResolverError> {
        match self.load_session(id).await {
            Ok(Some(session)) => Ok(vec![session]),
            Ok(None) => Ok(Vec::new()),
            Err(e) if self.config.mask_storage_failure && e.is_storage() => {
                warn!(session_id = id, error = %e, "masking primary lookup failure");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Secondary lookup: read the index record, resolve each listed id,
    /// and opportunistically rewrite the record to drop dead ids.
    async fn resolve_by_service(
        &self,
        service_id: &str,
        secondary_key: &str,
    ) -> Result<Vec<IdPSession>, ResolverError> {
        if !self.config.secondary_indexing {
            return Err(ResolverError::SecondaryIndexingDisabled);
        }
        let caps = self.storage.capabilities();
        let context = truncate_to(service_id, caps.context_size, "service id");
        let key = truncate_to(secondary_key, caps.key_size, "secondary key");

        let record = match self.storage.read(context, key).await {
            Ok(Some(rec)) => rec,
            Ok(None) => return Ok(Vec::new()),
            Err(e) if self.config.mask_storage_failure => {
                warn!(service_id, error = %e, "masking index lookup failure");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let ids = match decode_index_list(&record.value) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(service_id, error = %e, "undecodable index record treated as empty");
                return Ok(Vec::new());
            }
        };

        let mut live = Vec::new();
        let mut live_ids = Vec::new();
        for id in &ids {
            match self.load_session(id).await {
                Ok(Some(session)) => {
                    live_ids.push(id.clone());
                    live.push(session);
                }
                Ok(None) => debug!(session_id = %id, "dropping dead id from index"),
                Err(e) if self.config.mask_storage_failure && e.is_storage() => {
                    warn!(session_id = %id, error = %e, "masking primary lookup failure");
                }
                Err(e) => return Err(e),
            }
        }

        if live_ids.len() < ids.len() {
            self.sweep_index_record(context, key, record.version, record.expiration, &live_ids)
                .await;
        }
        Ok(live)
    }

    /// Best-effort rewrite of an index record after dead ids were found:
    /// drop the dead ids, or delete the record outright when nothing
    /// lives. Keeps the original expiration; sweeping must not extend or
    /// shorten the record's life.
    ///
    /// Uses the version read moments earlier; a lost race or an I/O error
    /// is logged and swallowed unconditionally. A lookup's success must
    /// never depend on this cleanup succeeding.
    async fn sweep_index_record(
        &self,
        context: &str,
        key: &str,
        version: u64,
        expiration: Option<OffsetDateTime>,
        live: &[String],
    ) {
        let outcome = if live.is_empty() {
            self.storage
                .delete_with_version(version, context, key)
                .await
                .map(|deleted| {
                    if deleted {
                        debug!(context, "removed empty index record");
                    }
                })
        } else {
            match encode_index_list(live) {
                Ok(value) => self
                    .storage
                    .update_with_version(version, context, key, &value, expiration)
                    .await
                    .map(|updated| {
                        if updated.is_some() {
                            debug!(context, "dropped dead ids from index record");
                        }
                    }),
                Err(e) => Err(e),
            }
        };
        if let Err(e) = outcome {
            debug!(context, error = %e, "index sweep failed, leaving record as is");
        }
    }
}

/// Length of ids produced by [`generate_session_id`]: 32 bytes base64url
/// without padding.
const GENERATED_ID_LEN: usize = 43;

/// Smallest backend value limit that can hold a serialized master record
/// or SP-session envelope with realistic entity ids and name identifiers.
const MIN_RECORD_VALUE_SIZE: usize = 1024;

/// Truncates a value to a backend size limit on a char boundary.
///
/// Lossy fallback: distinct values may collapse after truncation, which
/// costs lookup precision but never correctness of the primary records.
fn truncate_to<'a>(value: &'a str, max: usize, what: &str) -> &'a str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    warn!(what, max, "truncating oversized value for backend limits");
    &value[..end]
}

#[async_trait]
impl SessionManager for StorageBackedSessionService {
    async fn create_session(
        &self,
        principal_name: &str,
        ctx: &mut RequestContext,
    ) -> Result<IdPSession, SessionError> {
        let id = generate_session_id();
        let caps = self.storage.capabilities();
        if id.len() > caps.context_size {
            return Err(SessionError::SessionIdTooLong {
                len: id.len(),
                max: caps.context_size,
            });
        }

        let mut session = IdPSession::new(id, principal_name);
        if self.config.consistent_address {
            match ctx.remote_addr() {
                Some(addr) => session.bind_address(addr),
                None => return Err(SessionError::MissingClientAddress),
            }
        }

        let record = Self::master_record_of(&session);
        let value = record.encode()?;
        let expiration = self.retention_expiration(session.last_activity_instant());
        match self
            .storage
            .create(session.id(), MASTER_RECORD_KEY, &value, Some(expiration))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                return Err(SessionError::DuplicateSessionId {
                    id: session.id().to_string(),
                });
            }
            Err(e) if self.config.mask_storage_failure && e.is_backend() => {
                warn!(session_id = session.id(), error = %e, "masking session create failure");
            }
            Err(e) => return Err(e.into()),
        }

        ctx.set_session_cookie(&self.config.cookie_name, session.id());
        debug!(
            session_id = session.id(),
            principal = principal_name,
            "created session"
        );
        Ok(session)
    }

    async fn destroy_session(
        &self,
        id: &str,
        unbind: bool,
        ctx: Option<&mut RequestContext>,
    ) -> Result<(), SessionError> {
        if unbind {
            if let Some(ctx) = ctx {
                ctx.clear_session_cookie(&self.config.cookie_name);
            }
        }
        match self.storage.delete_context(id).await {
            Ok(()) => {
                debug!(session_id = id, "destroyed session");
                Ok(())
            }
            Err(e) if self.config.mask_storage_failure && e.is_backend() => {
                warn!(session_id = id, error = %e, "masking session destroy failure");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SessionResolver for StorageBackedSessionService {
    async fn resolve(&self, criteria: &SessionCriteria) -> Result<Vec<IdPSession>, ResolverError> {
        match criteria {
            SessionCriteria::CurrentRequest {
                session_cookie: None,
            } => Ok(Vec::new()),
            SessionCriteria::CurrentRequest {
                session_cookie: Some(id),
            } => self.resolve_primary(id).await,
            SessionCriteria::SessionId { id } => self.resolve_primary(id).await,
            SessionCriteria::Service { service_id, key } => {
                self.resolve_by_service(service_id, key).await
            }
        }
    }
}


//! Master SSO session model.

use std::collections::HashMap;
use std::net::IpAddr;

use time::OffsetDateTime;

use super::result::AuthenticationResult;
use super::sp_session::SPSession;

/// A server-side single-sign-on session for one authenticated principal.
///
/// The id doubles as the storage context name. The principal is set once
/// at creation and never changes in place; a different principal showing
/// up on the same client is an identity switch and destroys the session
/// (see [`DetectIdentitySwitch`](crate::actions::DetectIdentitySwitch)).
///
/// Logical expiration is `last_activity_instant + inactivity_timeout`;
/// storage retention additionally extends record TTLs by a configurable
/// slop so records survive long enough for logout processing, without
/// relaxing the logical timeout.
#[derive(Debug, Clone)]
pub struct IdPSession {
    id: String,
    principal_name: String,
    creation_instant: OffsetDateTime,
    last_activity_instant: OffsetDateTime,
    address: Option<IpAddr>,
    authentication_results: HashMap<String, AuthenticationResult>,
    sp_sessions: HashMap<String, SPSession>,
}

impl IdPSession {
    /// Creates a fresh session for a principal, active now.
    #[must_use]
    pub fn new(id: impl Into<String>, principal_name: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: id.into(),
            principal_name: principal_name.into(),
            creation_instant: now,
            last_activity_instant: now,
            address: None,
            authentication_results: HashMap::new(),
            sp_sessions: HashMap::new(),
        }
    }

    /// Reassembles a session from its persisted parts.
    #[must_use]
    pub(crate) fn from_parts(
        id: String,
        principal_name: String,
        creation_instant: OffsetDateTime,
        last_activity_instant: OffsetDateTime,
        address: Option<IpAddr>,
        authentication_results: HashMap<String, AuthenticationResult>,
        sp_sessions: HashMap<String, SPSession>,
    ) -> Self {
        Self {
            id,
            principal_name,
            creation_instant,
            last_activity_instant,
            address,
            authentication_results,
            sp_sessions,
        }
    }

    /// Returns the session id (also the storage context name).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the canonical principal name bound to this session.
    #[must_use]
    pub fn principal_name(&self) -> &str {
        &self.principal_name
    }

    /// Returns when the session was created.
    #[must_use]
    pub fn creation_instant(&self) -> OffsetDateTime {
        self.creation_instant
    }

    /// Returns the last recorded activity.
    #[must_use]
    pub fn last_activity_instant(&self) -> OffsetDateTime {
        self.last_activity_instant
    }

    /// Returns the client address bound to the session, if any.
    #[must_use]
    pub fn address(&self) -> Option<IpAddr> {
        self.address
    }

    /// Binds a client address to the session.
    pub(crate) fn bind_address(&mut self, address: IpAddr) {
        self.address = Some(address);
    }

    /// Moves the activity timestamp forward. Earlier instants are ignored
    /// so racing touches cannot move activity backwards in memory.
    pub(crate) fn touch(&mut self, now: OffsetDateTime) {
        if now > self.last_activity_instant {
            self.last_activity_instant = now;
        }
    }

    /// Returns `true` if the session has logically timed out as of `now`.
    #[must_use]
    pub fn is_timed_out(&self, inactivity_timeout: std::time::Duration, now: OffsetDateTime) -> bool {
        self.last_activity_instant + inactivity_timeout <= now
    }

    /// Returns `true` if `address` matches the bound address, or no
    /// address has been bound yet.
    #[must_use]
    pub fn check_address(&self, address: IpAddr) -> bool {
        match self.address {
            Some(bound) => bound == address,
            None => true,
        }
    }

    /// Returns the stored authentication results, keyed by flow id.
    #[must_use]
    pub fn authentication_results(&self) -> &HashMap<String, AuthenticationResult> {
        &self.authentication_results
    }

    /// Returns the stored result for a flow, if any.
    #[must_use]
    pub fn authentication_result(&self, flow_id: &str) -> Option<&AuthenticationResult> {
        self.authentication_results.get(flow_id)
    }

    /// Inserts a result, replacing any prior result for the same flow.
    /// Returns the replaced result.
    pub(crate) fn put_authentication_result(
        &mut self,
        result: AuthenticationResult,
    ) -> Option<AuthenticationResult> {
        self.authentication_results
            .insert(result.flow_id.clone(), result)
    }

    /// Returns the SP sessions, keyed by service id.
    #[must_use]
    pub fn sp_sessions(&self) -> &HashMap<String, SPSession> {
        &self.sp_sessions
    }

    /// Returns the SP session for a relying party, if any.
    #[must_use]
    pub fn sp_session(&self, service_id: &str) -> Option<&SPSession> {
        self.sp_sessions.get(service_id)
    }

    /// Inserts an SP session, replacing any prior one for the same relying
    /// party. Returns the replaced session.
    pub(crate) fn put_sp_session(&mut self, sp_session: SPSession) -> Option<SPSession> {
        self.sp_sessions
            .insert(sp_session.service_id().to_string(), sp_session)
    }
}

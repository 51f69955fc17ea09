//! Attaches the current request's session to the profile context.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::context::ProfileContext;
use crate::request::RequestContext;
use crate::resolver::{SessionCriteria, SessionResolver};
use crate::storage_backed::StorageBackedSessionService;

use super::ActionError;

/// Pluggable mapping from a request to lookup criteria.
pub type CriteriaStrategy = Arc<dyn Fn(&RequestContext) -> SessionCriteria + Send + Sync>;

/// Resolves the session referenced by the request and, after validating
/// it, attaches it to the profile context.
///
/// A session that fails validation (logical timeout, address mismatch) is
/// treated as absent, not as an error: the request simply proceeds
/// unauthenticated. A session that passes gets its activity timestamp
/// extended and persisted.
pub struct PopulateSessionContext {
    service: Arc<StorageBackedSessionService>,
    criteria_strategy: Option<CriteriaStrategy>,
}

impl PopulateSessionContext {
    /// Creates the action with the default strategy: the configured
    /// session cookie on the current request.
    #[must_use]
    pub fn new(service: Arc<StorageBackedSessionService>) -> Self {
        Self {
            service,
            criteria_strategy: None,
        }
    }

    /// Replaces the criteria strategy.
    #[must_use]
    pub fn with_criteria_strategy(mut self, strategy: CriteriaStrategy) -> Self {
        self.criteria_strategy = Some(strategy);
        self
    }

    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns resolver/storage failures per the masking configuration;
    /// validation failures are not errors.
    pub async fn execute(
        &self,
        profile: &mut ProfileContext,
        request: &RequestContext,
    ) -> Result<(), ActionError> {
        let criteria = match &self.criteria_strategy {
            Some(strategy) => strategy(request),
            None => self.service.criteria_for_request(request),
        };

        let Some(mut session) = self.service.resolve_single(&criteria).await? else {
            debug!("no session resolved for request");
            return Ok(());
        };

        let now = OffsetDateTime::now_utc();
        let timeout = self.service.config().inactivity_timeout;
        if session.is_timed_out(timeout, now) {
            debug!(session_id = session.id(), "session timed out, treating as absent");
            return Ok(());
        }

        if self.service.config().consistent_address {
            if let Some(addr) = request.remote_addr() {
                if !session.check_address(addr) {
                    warn!(
                        session_id = session.id(),
                        %addr,
                        "session address mismatch, treating as absent"
                    );
                    return Ok(());
                }
            }
        }

        self.service.touch_activity(&mut session).await?;
        debug!(session_id = session.id(), "attached session to request");
        profile.session_context.session = Some(session);
        Ok(())
    }
}

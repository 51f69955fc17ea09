//! Records a new relying-party federation on the attached session.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use crate::context::ProfileContext;
use crate::storage_backed::StorageBackedSessionService;
use crate::types::SPSession;

use super::ActionError;

/// Builds the SP session describing a federation just established.
///
/// Implemented per profile/protocol upstream; returning `None` declines
/// to record anything (e.g. the response carried no assertion worth
/// tracking).
pub trait SPSessionStrategy: Send + Sync {
    /// Builds the SP session for the current request, if any.
    fn build(&self, profile: &ProfileContext, now: OffsetDateTime) -> Option<SPSession>;
}

impl<F> SPSessionStrategy for F
where
    F: Fn(&ProfileContext, OffsetDateTime) -> Option<SPSession> + Send + Sync,
{
    fn build(&self, profile: &ProfileContext, now: OffsetDateTime) -> Option<SPSession> {
        self(profile, now)
    }
}

/// Appends the strategy-built SP session to the attached session,
/// replacing any prior federation with the same relying party, and
/// triggers secondary-index maintenance as a side effect.
pub struct UpdateSessionWithSPSession {
    service: Arc<StorageBackedSessionService>,
    strategy: Arc<dyn SPSessionStrategy>,
}

impl UpdateSessionWithSPSession {
    /// Creates the action.
    #[must_use]
    pub fn new(
        service: Arc<StorageBackedSessionService>,
        strategy: Arc<dyn SPSessionStrategy>,
    ) -> Self {
        Self { service, strategy }
    }

    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns storage failures per the masking configuration and retry
    /// exhaustion from secondary-index contention.
    pub async fn execute(&self, profile: &mut ProfileContext) -> Result<(), ActionError> {
        if !self.service.config().track_sp_sessions {
            debug!("SP session tracking disabled, skipping");
            return Ok(());
        }

        let now = OffsetDateTime::now_utc();
        let Some(sp_session) = self.strategy.build(profile, now) else {
            debug!("strategy built no SP session");
            return Ok(());
        };

        let Some(session) = profile.session_context.session.as_mut() else {
            debug!("no session attached, nothing to update");
            return Ok(());
        };

        debug!(
            session_id = session.id(),
            service_id = sp_session.service_id(),
            "recording SP session"
        );
        self.service.add_sp_session(session, sp_session).await?;
        Ok(())
    }
}

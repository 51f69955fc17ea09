//! Enforces the one-principal-per-session invariant.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::ProfileContext;
use crate::manager::SessionManager;
use crate::storage_backed::StorageBackedSessionService;

use super::ActionError;

/// Outcome of an identity-switch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySwitch {
    /// The canonicalized principal matches the session (or there was
    /// nothing to compare).
    NoSwitch,
    /// A different principal authenticated: the old session was destroyed
    /// and detached.
    Switched,
}

/// Compares an attached session's principal against the freshly
/// canonicalized principal.
///
/// A session is bound to exactly one principal for its whole lifetime; a
/// mismatch means a different person authenticated on the same client, so
/// the old session is destroyed (without unbinding the cookie: the new
/// authentication will issue its own) and all cached session state is
/// cleared from the working context.
pub struct DetectIdentitySwitch {
    service: Arc<StorageBackedSessionService>,
}

impl DetectIdentitySwitch {
    /// Creates the action.
    #[must_use]
    pub fn new(service: Arc<StorageBackedSessionService>) -> Self {
        Self { service }
    }

    /// Runs the check.
    ///
    /// # Errors
    ///
    /// Returns storage failures from destroying the session, per the
    /// masking configuration.
    pub async fn execute(&self, profile: &mut ProfileContext) -> Result<IdentitySwitch, ActionError> {
        let (session_id, session_principal) = match profile.session() {
            Some(session) => (
                session.id().to_string(),
                session.principal_name().to_string(),
            ),
            None => return Ok(IdentitySwitch::NoSwitch),
        };
        let Some(new_principal) = profile.canonicalized_principal.as_deref() else {
            return Ok(IdentitySwitch::NoSwitch);
        };

        if session_principal == new_principal {
            debug!(session_id, "principal unchanged");
            return Ok(IdentitySwitch::NoSwitch);
        }

        warn!(
            session_id,
            old = session_principal,
            new = new_principal,
            "identity switch detected, destroying session"
        );
        self.service.destroy_session(&session_id, false, None).await?;
        profile.clear_session_state();
        Ok(IdentitySwitch::Switched)
    }
}

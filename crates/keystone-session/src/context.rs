//! Working contexts shared by lifecycle actions.
//!
//! A [`ProfileContext`] is the per-request scratch state the actions read
//! and mutate: the resolved session, the active-results cache, and the
//! canonicalized principal produced by upstream subject canonicalization.
//! It holds no storage state of its own.

use std::collections::HashMap;

use crate::types::{AuthenticationResult, IdPSession};

/// Session slot within a profile context.
#[derive(Debug, Default)]
pub struct SessionContext {
    /// The resolved session, if any.
    pub session: Option<IdPSession>,
}

/// Authentication working state within a profile context.
#[derive(Debug, Default)]
pub struct AuthenticationContext {
    /// Results copied from the session that are still usable for SSO,
    /// keyed by flow id.
    pub active_results: HashMap<String, AuthenticationResult>,
}

/// Per-request working state for the session lifecycle actions.
#[derive(Debug, Default)]
pub struct ProfileContext {
    /// The session attached to this request, if resolved.
    pub session_context: SessionContext,
    /// Authentication scratch state.
    pub authentication_context: AuthenticationContext,
    /// Principal name produced by subject canonicalization, if any.
    pub canonicalized_principal: Option<String>,
}

impl ProfileContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attached session, if any.
    #[must_use]
    pub fn session(&self) -> Option<&IdPSession> {
        self.session_context.session.as_ref()
    }

    /// Detaches the session and clears cached active results.
    pub fn clear_session_state(&mut self) {
        self.session_context.session = None;
        self.authentication_context.active_results.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_session_state() {
        let mut ctx = ProfileContext::new();
        ctx.session_context.session = Some(IdPSession::new("abc", "alice"));
        ctx.authentication_context
            .active_results
            .insert("authn/Password".to_string(), AuthenticationResult::new("authn/Password", "alice"));

        ctx.clear_session_state();
        assert!(ctx.session().is_none());
        assert!(ctx.authentication_context.active_results.is_empty());
    }
}

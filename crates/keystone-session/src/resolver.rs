//! Session resolver interface and lookup criteria.

use async_trait::async_trait;

use crate::error::ResolverError;
use crate::request::RequestContext;
use crate::types::IdPSession;

/// What to look a session up by.
///
/// The three kinds are mutually exclusive and dispatched exhaustively;
/// an unsupported request is a [`ResolverError`] variant, never a panic
/// or a silent fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCriteria {
    /// The session identified by the current request's cookie, if any.
    CurrentRequest {
        /// Value of the session cookie extracted from the request.
        session_cookie: Option<String>,
    },
    /// Direct primary lookup by session id.
    SessionId {
        /// The session id.
        id: String,
    },
    /// Secondary lookup by relying party and protocol-specific key.
    /// Requires secondary indexing to be enabled.
    Service {
        /// Relying party identifier.
        service_id: String,
        /// Protocol-specific key (e.g. a federated name identifier).
        key: String,
    },
}

impl SessionCriteria {
    /// Criteria for the session referenced by a request's cookie.
    #[must_use]
    pub fn from_request(cookie_name: &str, ctx: &RequestContext) -> Self {
        Self::CurrentRequest {
            session_cookie: ctx.cookie(cookie_name).map(str::to_string),
        }
    }

    /// Criteria for a known session id.
    #[must_use]
    pub fn session_id(id: impl Into<String>) -> Self {
        Self::SessionId { id: id.into() }
    }

    /// Criteria for a relying party's `(service id, secondary key)` pair.
    #[must_use]
    pub fn service(service_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Service {
            service_id: service_id.into(),
            key: key.into(),
        }
    }
}

/// Looks sessions up by [`SessionCriteria`].
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolves every session matching the criteria.
    ///
    /// Service lookups may legitimately return several sessions (the same
    /// user signed in twice, federating to the same relying party each
    /// time). Primary lookups return at most one.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::SecondaryIndexingDisabled` for service
    /// criteria when indexing is off, and storage errors per the masking
    /// configuration.
    async fn resolve(&self, criteria: &SessionCriteria) -> Result<Vec<IdPSession>, ResolverError>;

    /// Resolves the first session matching the criteria.
    ///
    /// Multiple matches are not an error; callers that care should use
    /// [`resolve`](Self::resolve).
    ///
    /// # Errors
    ///
    /// As for [`resolve`](Self::resolve).
    async fn resolve_single(
        &self,
        criteria: &SessionCriteria,
    ) -> Result<Option<IdPSession>, ResolverError> {
        Ok(self.resolve(criteria).await?.into_iter().next())
    }
}

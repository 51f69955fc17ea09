//! Session manager interface.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::request::RequestContext;
use crate::types::IdPSession;

/// Creates and destroys SSO sessions.
///
/// The storage-backed implementation is
/// [`StorageBackedSessionService`](crate::StorageBackedSessionService).
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Creates a new session for a canonicalized principal name and issues
    /// the session cookie into the request context.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingClientAddress` when address binding is
    /// enabled and the request has no client address,
    /// `SessionError::DuplicateSessionId` on id collision, and storage
    /// errors per the masking configuration.
    async fn create_session(
        &self,
        principal_name: &str,
        ctx: &mut RequestContext,
    ) -> Result<IdPSession, SessionError>;

    /// Destroys a session.
    ///
    /// When `unbind` is set and a request context is supplied, the session
    /// cookie is cleared. Secondary-index records referencing the session
    /// are left in place and garbage-collected the next time they are read.
    ///
    /// # Errors
    ///
    /// Returns storage errors per the masking configuration.
    async fn destroy_session(
        &self,
        id: &str,
        unbind: bool,
        ctx: Option<&mut RequestContext>,
    ) -> Result<(), SessionError>;
}

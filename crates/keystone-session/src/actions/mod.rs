//! Session lifecycle actions.
//!
//! Thin operations over the session manager/resolver, each mutating a
//! [`ProfileContext`](crate::context::ProfileContext):
//!
//! - [`PopulateSessionContext`] - attach the current request's session
//! - [`DetectIdentitySwitch`] - enforce one-principal-per-session
//! - [`ExtractActiveAuthenticationResults`] - surface results usable for SSO
//! - [`UpdateSessionWithSPSession`] - record a new relying-party federation

mod detect_identity_switch;
mod extract_active_results;
mod populate_session_context;
mod update_session_with_sp_session;

pub use detect_identity_switch::{DetectIdentitySwitch, IdentitySwitch};
pub use extract_active_results::ExtractActiveAuthenticationResults;
pub use populate_session_context::{CriteriaStrategy, PopulateSessionContext};
pub use update_session_with_sp_session::{SPSessionStrategy, UpdateSessionWithSPSession};

use crate::error::{ResolverError, SessionError};

/// Failure of a lifecycle action, preserving which data path failed.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// The write path failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The read path failed.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

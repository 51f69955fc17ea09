//! Session layer data model.
//!
//! ## Entities
//!
//! - [`IdPSession`] - the master single-sign-on session, one per
//!   authenticated principal
//! - [`AuthenticationResult`] - one per authentication flow run within a
//!   session
//! - [`SPSession`] - one per relying party the session has federated to
//!
//! All entities serialize with serde so storage codecs stay trivial.

mod result;
mod session;
mod sp_session;

pub use result::AuthenticationResult;
pub use session::IdPSession;
pub use sp_session::{BasicSPSession, SPSession, SPSessionKind, Saml2SPSession};

//! # keystone-session
//!
//! Storage-backed SSO session layer for an identity provider.
//!
//! Tracks authenticated users, their per-flow authentication results, and
//! their per-relying-party federations (SP sessions), persisted in a
//! pluggable key/value store
//! ([`StorageService`](keystone_storage::StorageService)). Sessions are
//! found by primary lookup (session id / cookie) or by secondary lookup
//! (relying party id + protocol-specific key), the latter powering single
//! logout.
//!
//! There are no database transactions and no in-process locks: all
//! correctness comes from the backend's per-record optimistic versioning
//! and TTLs. The one genuinely contended record, the secondary index, is
//! maintained with a bounded optimistic-retry loop.
//!
//! ## Modules
//!
//! - [`types`] - the persisted entities (session, results, SP sessions)
//! - [`serialize`] - storage codecs and the SP-session dispatch table
//! - [`manager`] / [`resolver`] - the produced interfaces
//! - [`storage_backed`] - the storage-backed implementation of both
//! - [`actions`] - lifecycle actions over a working [`context`]
//! - [`flow`] - per-flow activity policies for silent SSO
//! - [`logout`] - best-effort logout propagation fan-out
//! - [`config`] - construction-time configuration
//! - [`request`] - the narrow request/cookie contract
//! - [`error`] - the session/resolver error taxonomy

pub mod actions;
pub mod config;
pub mod context;
pub mod error;
pub mod flow;
pub mod id;
pub mod logout;
pub mod manager;
pub mod request;
pub mod resolver;
pub mod serialize;
pub mod storage_backed;
pub mod types;

pub use actions::{
    ActionError, DetectIdentitySwitch, ExtractActiveAuthenticationResults, IdentitySwitch,
    PopulateSessionContext, SPSessionStrategy, UpdateSessionWithSPSession,
};
pub use config::SessionConfig;
pub use context::{AuthenticationContext, ProfileContext, SessionContext};
pub use error::{ResolverError, SessionError};
pub use flow::{ActivityCondition, FlowPolicyRegistry, TimeoutActivityCondition};
pub use logout::{
    LogoutPropagationService, LogoutPropagator, PropagationError, PropagationOutcome,
    PropagationResult,
};
pub use manager::SessionManager;
pub use request::RequestContext;
pub use resolver::{SessionCriteria, SessionResolver};
pub use serialize::{SPSessionCodec, SPSessionCodecRegistry, SessionMasterRecord};
pub use storage_backed::StorageBackedSessionService;
pub use types::{AuthenticationResult, BasicSPSession, IdPSession, SPSession, SPSessionKind, Saml2SPSession};

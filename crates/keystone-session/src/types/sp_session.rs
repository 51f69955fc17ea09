//! Relying-party (SP) session model.
//!
//! An [`SPSession`] records a federation established with one relying
//! party and is owned by exactly one [`IdPSession`](super::IdPSession).
//! It must also be discoverable *before* its parent session id is known:
//! single logout is driven by the relying party, which only knows its own
//! identifier and a protocol-specific key. That key is exposed here as the
//! `secondary_key` and feeds the secondary index.

use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Protocol discriminator for [`SPSession`] variants.
///
/// Keys the codec-dispatch table and the logout-propagator registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SPSessionKind {
    /// Protocol-agnostic session with no logout support.
    Basic,
    /// SAML 2.0 session keyed by federated name identifier.
    Saml2,
}

impl fmt::Display for SPSessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "basic"),
            Self::Saml2 => write!(f, "saml2"),
        }
    }
}

/// A minimal SP session: tracks the federation but carries no
/// protocol-specific state and no secondary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicSPSession {
    /// Relying party identifier.
    pub service_id: String,

    /// When the federation was established.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_instant: OffsetDateTime,

    /// When the federation lapses.
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_instant: OffsetDateTime,
}

/// A SAML 2.0 SP session.
///
/// The name identifier doubles as the secondary-index key so logout
/// requests carrying only `(entity id, NameID)` can find the owning
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Saml2SPSession {
    /// Relying party entity id.
    pub service_id: String,

    /// When the federation was established.
    #[serde(with = "time::serde::rfc3339")]
    pub creation_instant: OffsetDateTime,

    /// When the federation lapses.
    #[serde(with = "time::serde::rfc3339")]
    pub expiration_instant: OffsetDateTime,

    /// Federated name identifier issued to the relying party.
    pub name_id: String,

    /// SessionIndex value issued in the assertion, echoed during logout.
    pub session_index: String,
}

/// A federation with one relying party, in one of the supported protocols.
///
/// The variant set is sealed: adding a protocol means adding a variant, a
/// codec and (optionally) a logout propagator, all dispatched explicitly
/// by [`SPSessionKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SPSession {
    /// Protocol-agnostic session.
    Basic(BasicSPSession),
    /// SAML 2.0 session.
    Saml2(Saml2SPSession),
}

impl SPSession {
    /// Returns the protocol discriminator.
    #[must_use]
    pub fn kind(&self) -> SPSessionKind {
        match self {
            Self::Basic(_) => SPSessionKind::Basic,
            Self::Saml2(_) => SPSessionKind::Saml2,
        }
    }

    /// Returns the relying party identifier.
    #[must_use]
    pub fn service_id(&self) -> &str {
        match self {
            Self::Basic(s) => &s.service_id,
            Self::Saml2(s) => &s.service_id,
        }
    }

    /// Returns when the federation was established.
    #[must_use]
    pub fn creation_instant(&self) -> OffsetDateTime {
        match self {
            Self::Basic(s) => s.creation_instant,
            Self::Saml2(s) => s.creation_instant,
        }
    }

    /// Returns when the federation lapses.
    #[must_use]
    pub fn expiration_instant(&self) -> OffsetDateTime {
        match self {
            Self::Basic(s) => s.expiration_instant,
            Self::Saml2(s) => s.expiration_instant,
        }
    }

    /// Returns the protocol-specific key used for secondary indexing, if
    /// this protocol has one.
    #[must_use]
    pub fn secondary_key(&self) -> Option<&str> {
        match self {
            Self::Basic(_) => None,
            Self::Saml2(s) => Some(&s.name_id),
        }
    }

    /// Returns `true` if the federation has lapsed as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expiration_instant() <= now
    }
}

//! Logout propagation preparation.
//!
//! Given the `(service id -> SPSession)` pairs recorded on a session,
//! pick a logout mechanism per relying party and drive one propagation
//! attempt each, independently: a relying party whose endpoint is down
//! must not keep the others from being notified. The actual wire
//! exchanges (SAML LogoutRequest encoding, transport) live behind the
//! [`LogoutPropagator`] trait and are out of scope here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::types::{SPSession, SPSessionKind};

/// Failure of one propagation attempt.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct PropagationError {
    /// Description of the failure.
    pub message: String,
}

impl PropagationError {
    /// Creates a new error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Drives logout for one federation protocol.
#[async_trait]
pub trait LogoutPropagator: Send + Sync {
    /// The SP session variant this propagator handles.
    fn kind(&self) -> SPSessionKind;

    /// Attempts to notify the relying party behind `sp_session`.
    ///
    /// # Errors
    ///
    /// Returns a `PropagationError` describing why the relying party could
    /// not be notified.
    async fn propagate(&self, sp_session: &SPSession) -> Result<(), PropagationError>;
}

/// Outcome of one relying party's propagation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropagationOutcome {
    /// The relying party was notified.
    Succeeded,
    /// The attempt failed; the reason is informational only.
    Failed(String),
    /// No propagator is registered for this session's protocol.
    Unsupported,
}

/// Per-relying-party propagation report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropagationResult {
    /// The relying party.
    pub service_id: String,
    /// What happened.
    pub outcome: PropagationOutcome,
}

/// Fans logout out across a session's relying parties.
///
/// The propagator table is immutable configuration injected at
/// construction, keyed by protocol like the codec registry.
#[derive(Clone, Default)]
pub struct LogoutPropagationService {
    propagators: HashMap<SPSessionKind, Arc<dyn LogoutPropagator>>,
}

impl LogoutPropagationService {
    /// Creates a service with no propagators registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a propagator, replacing any prior one for the same kind.
    #[must_use]
    pub fn with_propagator(mut self, propagator: Arc<dyn LogoutPropagator>) -> Self {
        self.propagators.insert(propagator.kind(), propagator);
        self
    }

    /// Attempts propagation for every SP session, best effort.
    ///
    /// All attempts run; one relying party's failure never blocks the
    /// rest. Results come back in no particular order.
    pub async fn propagate_all(
        &self,
        sp_sessions: &HashMap<String, SPSession>,
    ) -> Vec<PropagationResult> {
        let attempts = sp_sessions.iter().map(|(service_id, sp_session)| {
            let propagator = self.propagators.get(&sp_session.kind()).cloned();
            async move {
                let outcome = match propagator {
                    Some(p) => match p.propagate(sp_session).await {
                        Ok(()) => {
                            debug!(service_id, "logout propagated");
                            PropagationOutcome::Succeeded
                        }
                        Err(e) => {
                            warn!(service_id, error = %e, "logout propagation failed");
                            PropagationOutcome::Failed(e.message)
                        }
                    },
                    None => {
                        debug!(
                            service_id,
                            kind = %sp_session.kind(),
                            "no propagator for protocol"
                        );
                        PropagationOutcome::Unsupported
                    }
                };
                PropagationResult {
                    service_id: service_id.clone(),
                    outcome,
                }
            }
        });
        join_all(attempts).await
    }
}

impl std::fmt::Debug for LogoutPropagationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutPropagationService")
            .field("kinds", &self.propagators.keys().collect::<Vec<_>>())
            .finish()
    }
}

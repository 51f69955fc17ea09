//! Per-flow activity policies.
//!
//! Whether a stored [`AuthenticationResult`] is still usable for silent
//! SSO is a per-flow decision, not a fixed rule: a password flow might
//! accept day-old results while an MFA flow insists on minutes. The
//! registry maps flow ids to their policy and is immutable configuration
//! injected at construction.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::types::AuthenticationResult;

/// Decides whether a stored result can still satisfy a flow silently.
pub trait ActivityCondition: Send + Sync {
    /// Returns `true` if `result` is still usable for SSO as of `now`.
    fn is_active(&self, result: &AuthenticationResult, now: OffsetDateTime) -> bool;
}

/// The standard policy: a result stays active while it is within its
/// absolute lifetime and its own inactivity window.
#[derive(Debug, Clone)]
pub struct TimeoutActivityCondition {
    /// Absolute bound from the authentication instant.
    pub max_lifetime: Duration,
    /// Sliding bound from the result's last activity.
    pub inactivity_timeout: Duration,
}

impl TimeoutActivityCondition {
    /// Creates a condition with the given bounds.
    #[must_use]
    pub fn new(max_lifetime: Duration, inactivity_timeout: Duration) -> Self {
        Self {
            max_lifetime,
            inactivity_timeout,
        }
    }
}

impl ActivityCondition for TimeoutActivityCondition {
    fn is_active(&self, result: &AuthenticationResult, now: OffsetDateTime) -> bool {
        now < result.authentication_instant + self.max_lifetime
            && now < result.last_activity_instant + self.inactivity_timeout
    }
}

/// Registry mapping flow ids to their activity policy.
///
/// A result whose flow is not registered is treated as inactive: an
/// unknown flow cannot vouch for its own results.
#[derive(Clone, Default)]
pub struct FlowPolicyRegistry {
    policies: HashMap<String, Arc<dyn ActivityCondition>>,
}

impl FlowPolicyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a policy for a flow, replacing any prior one.
    #[must_use]
    pub fn with_policy(
        mut self,
        flow_id: impl Into<String>,
        condition: Arc<dyn ActivityCondition>,
    ) -> Self {
        self.policies.insert(flow_id.into(), condition);
        self
    }

    /// Returns the policy for a flow, if registered.
    #[must_use]
    pub fn condition_for(&self, flow_id: &str) -> Option<&Arc<dyn ActivityCondition>> {
        self.policies.get(flow_id)
    }
}

impl std::fmt::Debug for FlowPolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowPolicyRegistry")
            .field("flows", &self.policies.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! Surfaces a session's results that are still usable for silent SSO.

use time::OffsetDateTime;
use tracing::debug;

use crate::context::ProfileContext;
use crate::flow::FlowPolicyRegistry;

/// Copies a session's stored authentication results into the working
/// authentication context, filtering each through its flow's activity
/// policy. A result whose flow is unknown to the registry is dropped as
/// inactive.
#[derive(Debug)]
pub struct ExtractActiveAuthenticationResults {
    flows: FlowPolicyRegistry,
}

impl ExtractActiveAuthenticationResults {
    /// Creates the action over a flow-policy registry.
    #[must_use]
    pub fn new(flows: FlowPolicyRegistry) -> Self {
        Self { flows }
    }

    /// Runs the extraction. Purely in-memory; never fails.
    pub fn execute(&self, profile: &mut ProfileContext) {
        let Some(session) = profile.session() else {
            return;
        };

        let now = OffsetDateTime::now_utc();
        let mut active = Vec::new();
        for (flow_id, result) in session.authentication_results() {
            match self.flows.condition_for(flow_id) {
                Some(condition) if condition.is_active(result, now) => {
                    active.push(result.clone());
                }
                Some(_) => debug!(flow_id, "result no longer active"),
                None => debug!(flow_id, "unknown flow, dropping result as inactive"),
            }
        }

        let results = &mut profile.authentication_context.active_results;
        results.clear();
        for result in active {
            results.insert(result.flow_id.clone(), result);
        }
    }
}

//! Authentication result model.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// The outcome of one authentication flow run within a session.
///
/// A session holds at most one live result per flow id: re-authenticating
/// under the same flow replaces the prior result. Whether a stored result
/// is still usable for silent SSO is decided per flow by an
/// [`ActivityCondition`](crate::flow::ActivityCondition), not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    /// Id of the flow that produced this result.
    pub flow_id: String,

    /// Principal names established by the flow.
    pub principals: BTreeSet<String>,

    /// When the authentication completed.
    #[serde(with = "time::serde::rfc3339")]
    pub authentication_instant: OffsetDateTime,

    /// Last time this result was used to satisfy a request.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity_instant: OffsetDateTime,
}

impl AuthenticationResult {
    /// Creates a result for a single principal, authenticated now.
    #[must_use]
    pub fn new(flow_id: impl Into<String>, principal: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc();
        let mut principals = BTreeSet::new();
        principals.insert(principal.into());
        Self {
            flow_id: flow_id.into(),
            principals,
            authentication_instant: now,
            last_activity_instant: now,
        }
    }

    /// Marks the result as used at `now`.
    pub fn touch(&mut self, now: OffsetDateTime) {
        self.last_activity_instant = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn test_new_result() {
        let result = AuthenticationResult::new("authn/Password", "alice");
        assert_eq!(result.flow_id, "authn/Password");
        assert!(result.principals.contains("alice"));
        assert_eq!(result.authentication_instant, result.last_activity_instant);
    }

    #[test]
    fn test_touch_moves_activity_only() {
        let mut result = AuthenticationResult::new("authn/Password", "alice");
        let authn = result.authentication_instant;
        let later = authn + Duration::minutes(5);

        result.touch(later);
        assert_eq!(result.authentication_instant, authn);
        assert_eq!(result.last_activity_instant, later);
    }

    #[test]
    fn test_serialization_round_trip() {
        let result = AuthenticationResult::new("authn/MFA", "bob");
        let json = serde_json::to_string(&result).unwrap();
        let back: AuthenticationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(result, back);
    }
}

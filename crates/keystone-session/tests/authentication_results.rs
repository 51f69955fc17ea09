//! Per-flow authentication results and the actions that consume them.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use keystone_db_memory::MemoryStorage;
use keystone_session::actions::{ExtractActiveAuthenticationResults, UpdateSessionWithSPSession};
use keystone_session::{
    AuthenticationResult, FlowPolicyRegistry, IdPSession, ProfileContext, RequestContext,
    SPSession, SPSessionStrategy, Saml2SPSession, SessionConfig, SessionCriteria, SessionManager,
    SessionResolver, StorageBackedSessionService, TimeoutActivityCondition,
};
use keystone_storage::StorageService;

fn client_addr() -> IpAddr {
    "192.0.2.10".parse().unwrap()
}

fn default_service() -> (Arc<MemoryStorage>, Arc<StorageBackedSessionService>) {
    let storage = Arc::new(MemoryStorage::new());
    let service =
        StorageBackedSessionService::new(storage.clone(), SessionConfig::default()).unwrap();
    (storage, Arc::new(service))
}

async fn new_session(service: &StorageBackedSessionService, principal: &str) -> IdPSession {
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    service.create_session(principal, &mut ctx).await.unwrap()
}

async fn reload(service: &StorageBackedSessionService, id: &str) -> IdPSession {
    service
        .resolve_single(&SessionCriteria::session_id(id))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn result_persists_and_reloads() {
    let (_, service) = default_service();
    let mut session = new_session(&service, "alice").await;

    service
        .add_authentication_result(&mut session, AuthenticationResult::new("authn/Password", "alice"))
        .await
        .unwrap();

    let stored = reload(&service, session.id()).await;
    let result = stored.authentication_result("authn/Password").unwrap();
    assert!(result.principals.contains("alice"));
}

#[tokio::test]
async fn reauthentication_replaces_result_for_same_flow() {
    let (storage, service) = default_service();
    let mut session = new_session(&service, "alice").await;

    let first = AuthenticationResult::new("authn/Password", "alice");
    let first_instant = first.authentication_instant;
    service
        .add_authentication_result(&mut session, first)
        .await
        .unwrap();

    let mut second = AuthenticationResult::new("authn/Password", "alice");
    second.authentication_instant = first_instant + time::Duration::minutes(10);
    service
        .add_authentication_result(&mut session, second)
        .await
        .unwrap();

    let stored = reload(&service, session.id()).await;
    assert_eq!(stored.authentication_results().len(), 1);
    assert_eq!(
        stored
            .authentication_result("authn/Password")
            .unwrap()
            .authentication_instant,
        first_instant + time::Duration::minutes(10)
    );

    // Master plus one sub-record per flow, not one per authentication.
    assert_eq!(storage.record_count().await, 2);
}

#[tokio::test]
async fn results_from_distinct_flows_coexist() {
    let (_, service) = default_service();
    let mut session = new_session(&service, "alice").await;

    service
        .add_authentication_result(&mut session, AuthenticationResult::new("authn/Password", "alice"))
        .await
        .unwrap();
    service
        .add_authentication_result(&mut session, AuthenticationResult::new("authn/MFA", "alice"))
        .await
        .unwrap();

    let stored = reload(&service, session.id()).await;
    assert_eq!(stored.authentication_results().len(), 2);
    assert!(stored.authentication_result("authn/Password").is_some());
    assert!(stored.authentication_result("authn/MFA").is_some());
}

#[tokio::test]
async fn extract_keeps_active_and_drops_stale_and_unknown() {
    let (_, service) = default_service();
    let mut session = new_session(&service, "alice").await;

    let fresh = AuthenticationResult::new("authn/Password", "alice");
    let mut stale = AuthenticationResult::new("authn/MFA", "alice");
    stale.authentication_instant -= time::Duration::hours(2);
    stale.last_activity_instant -= time::Duration::hours(2);
    let unknown = AuthenticationResult::new("authn/Legacy", "alice");

    for result in [fresh, stale, unknown] {
        service
            .add_authentication_result(&mut session, result)
            .await
            .unwrap();
    }

    let flows = FlowPolicyRegistry::new()
        .with_policy(
            "authn/Password",
            Arc::new(TimeoutActivityCondition::new(
                Duration::from_secs(8 * 3600),
                Duration::from_secs(3600),
            )),
        )
        .with_policy(
            "authn/MFA",
            Arc::new(TimeoutActivityCondition::new(
                Duration::from_secs(3600),
                Duration::from_secs(600),
            )),
        );

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(reload(&service, session.id()).await);

    ExtractActiveAuthenticationResults::new(flows).execute(&mut profile);

    let active = &profile.authentication_context.active_results;
    assert_eq!(active.len(), 1);
    assert!(active.contains_key("authn/Password"));
}

#[tokio::test]
async fn extract_without_session_is_a_no_op() {
    let mut profile = ProfileContext::new();
    ExtractActiveAuthenticationResults::new(FlowPolicyRegistry::new()).execute(&mut profile);
    assert!(profile.authentication_context.active_results.is_empty());
}

fn saml2_strategy() -> Arc<dyn SPSessionStrategy> {
    Arc::new(|_: &ProfileContext, now: OffsetDateTime| {
        Some(SPSession::Saml2(Saml2SPSession {
            service_id: "https://sp.example.org".to_string(),
            creation_instant: now,
            expiration_instant: now + time::Duration::hours(8),
            name_id: "nameid-123".to_string(),
            session_index: "_idx1".to_string(),
        }))
    })
}

#[tokio::test]
async fn update_action_records_sp_session_and_index() {
    let (storage, service) = default_service();
    let session = new_session(&service, "alice").await;
    let session_id = session.id().to_string();

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(session);

    let action = UpdateSessionWithSPSession::new(service.clone(), saml2_strategy());
    action.execute(&mut profile).await.unwrap();

    assert!(
        profile
            .session()
            .unwrap()
            .sp_session("https://sp.example.org")
            .is_some()
    );

    let stored = reload(&service, &session_id).await;
    assert!(stored.sp_session("https://sp.example.org").is_some());
    assert!(
        storage
            .read("https://sp.example.org", "nameid-123")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn update_action_skips_when_tracking_disabled() {
    let storage = Arc::new(MemoryStorage::new());
    let config = SessionConfig {
        track_sp_sessions: false,
        secondary_indexing: false,
        ..SessionConfig::default()
    };
    let service = Arc::new(StorageBackedSessionService::new(storage.clone(), config).unwrap());
    let session = new_session(&service, "alice").await;
    let session_id = session.id().to_string();

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(session);

    let action = UpdateSessionWithSPSession::new(service.clone(), saml2_strategy());
    action.execute(&mut profile).await.unwrap();

    assert!(profile.session().unwrap().sp_sessions().is_empty());
    let stored = reload(&service, &session_id).await;
    assert!(stored.sp_sessions().is_empty());
}

#[tokio::test]
async fn update_action_skips_when_strategy_declines() {
    let (storage, service) = default_service();
    let session = new_session(&service, "alice").await;

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(session);

    let strategy: Arc<dyn SPSessionStrategy> =
        Arc::new(|_: &ProfileContext, _: OffsetDateTime| None::<SPSession>);
    let action = UpdateSessionWithSPSession::new(service.clone(), strategy);
    action.execute(&mut profile).await.unwrap();

    assert!(profile.session().unwrap().sp_sessions().is_empty());
    assert!(
        storage
            .read("https://sp.example.org", "nameid-123")
            .await
            .unwrap()
            .is_none()
    );
}

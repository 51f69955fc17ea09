//! End-to-end session lifecycle over the in-memory backend.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use keystone_db_memory::MemoryStorage;
use keystone_session::actions::{DetectIdentitySwitch, IdentitySwitch, PopulateSessionContext};
use keystone_session::{
    ProfileContext, RequestContext, SessionConfig, SessionCriteria, SessionError, SessionManager,
    SessionResolver, StorageBackedSessionService,
};
use keystone_storage::{StorageCapabilities, StorageService};

fn client_addr() -> IpAddr {
    "192.0.2.10".parse().unwrap()
}

fn service_with(config: SessionConfig) -> (Arc<MemoryStorage>, Arc<StorageBackedSessionService>) {
    let storage = Arc::new(MemoryStorage::new());
    let service = StorageBackedSessionService::new(storage.clone(), config).unwrap();
    (storage, Arc::new(service))
}

fn default_service() -> (Arc<MemoryStorage>, Arc<StorageBackedSessionService>) {
    service_with(SessionConfig::default())
}

#[tokio::test]
async fn create_issues_fresh_id_and_cookie() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());

    let session = service.create_session("alice", &mut ctx).await.unwrap();
    assert_eq!(session.principal_name(), "alice");
    assert_eq!(session.id().len(), 43);
    assert_eq!(session.address(), Some(client_addr()));

    let cookie = &ctx.response_cookies()[0];
    assert_eq!(cookie.name(), "keystone_session");
    assert_eq!(cookie.value(), session.id());

    let mut ctx2 = RequestContext::with_remote_addr(client_addr());
    let other = service.create_session("alice", &mut ctx2).await.unwrap();
    assert_ne!(session.id(), other.id());
}

#[tokio::test]
async fn stored_expiration_is_creation_plus_timeout_plus_slop() {
    let config = SessionConfig {
        inactivity_timeout: Duration::from_secs(3600),
        slop: Duration::from_secs(300),
        ..SessionConfig::default()
    };
    let (storage, service) = service_with(config);
    let mut ctx = RequestContext::with_remote_addr(client_addr());

    let session = service.create_session("alice", &mut ctx).await.unwrap();

    let record = storage
        .read(session.id(), "_session")
        .await
        .unwrap()
        .unwrap();
    let expected = session.creation_instant() + Duration::from_secs(3600 + 300);
    assert_eq!(record.expiration, Some(expected));
}

#[tokio::test]
async fn create_requires_address_when_binding_enabled() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::new();

    let err = service.create_session("alice", &mut ctx).await.unwrap_err();
    assert!(matches!(err, SessionError::MissingClientAddress));
}

#[tokio::test]
async fn resolve_by_session_id_round_trip() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();

    let resolved = service
        .resolve_single(&SessionCriteria::session_id(session.id()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(resolved.id(), session.id());
    assert_eq!(resolved.principal_name(), "alice");
}

#[tokio::test]
async fn destroy_makes_session_unresolvable() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();

    service
        .destroy_session(session.id(), true, Some(&mut ctx))
        .await
        .unwrap();

    let resolved = service
        .resolve(&SessionCriteria::session_id(session.id()))
        .await
        .unwrap();
    assert!(resolved.is_empty());

    // Unbind queued a removal cookie after the create cookie.
    let removal = ctx.response_cookies().last().unwrap();
    assert_eq!(removal.name(), "keystone_session");
    assert_eq!(removal.value(), "");
}

#[tokio::test]
async fn resolve_by_cookie_times_out() {
    let config = SessionConfig {
        inactivity_timeout: Duration::from_millis(200),
        slop: Duration::ZERO,
        ..SessionConfig::default()
    };
    let (_, service) = service_with(config);
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();

    let mut request = RequestContext::with_remote_addr(client_addr());
    request.insert_cookie("keystone_session", session.id());

    let criteria = service.criteria_for_request(&request);
    assert!(service.resolve_single(&criteria).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(service.resolve_single(&criteria).await.unwrap().is_none());
}

#[tokio::test]
async fn populate_attaches_valid_session_and_extends_activity() {
    let (storage, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();

    let mut request = RequestContext::with_remote_addr(client_addr());
    request.insert_cookie("keystone_session", session.id());

    let action = PopulateSessionContext::new(service.clone());
    let mut profile = ProfileContext::new();

    tokio::time::sleep(Duration::from_millis(20)).await;
    action.execute(&mut profile, &request).await.unwrap();

    let attached = profile.session().unwrap();
    assert_eq!(attached.id(), session.id());
    assert!(attached.last_activity_instant() > session.last_activity_instant());

    // The extended timestamp was persisted, not just held in memory.
    let record = storage
        .read(session.id(), "_session")
        .await
        .unwrap()
        .unwrap();
    assert!(record.value.contains("lastActivityInstant"));
    assert!(record.version > 1);
}

#[tokio::test]
async fn populate_rejects_address_mismatch() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();

    let other_addr: IpAddr = "198.51.100.99".parse().unwrap();
    let mut request = RequestContext::with_remote_addr(other_addr);
    request.insert_cookie("keystone_session", session.id());

    let action = PopulateSessionContext::new(service.clone());
    let mut profile = ProfileContext::new();
    action.execute(&mut profile, &request).await.unwrap();

    // Treated as absent, not an error.
    assert!(profile.session().is_none());
}

#[tokio::test]
async fn identity_switch_destroys_and_detaches() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();
    let session_id = session.id().to_string();

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(session);
    profile.canonicalized_principal = Some("bob".to_string());

    let action = DetectIdentitySwitch::new(service.clone());
    let outcome = action.execute(&mut profile).await.unwrap();
    assert_eq!(outcome, IdentitySwitch::Switched);
    assert!(profile.session().is_none());
    assert!(profile.authentication_context.active_results.is_empty());

    let resolved = service
        .resolve(&SessionCriteria::session_id(&session_id))
        .await
        .unwrap();
    assert!(resolved.is_empty());

    // Second run with nothing attached is a no-op.
    let outcome = action.execute(&mut profile).await.unwrap();
    assert_eq!(outcome, IdentitySwitch::NoSwitch);
}

#[tokio::test]
async fn matching_principal_is_no_switch() {
    let (_, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let session = service.create_session("alice", &mut ctx).await.unwrap();
    let session_id = session.id().to_string();

    let mut profile = ProfileContext::new();
    profile.session_context.session = Some(session);
    profile.canonicalized_principal = Some("alice".to_string());

    let action = DetectIdentitySwitch::new(service.clone());
    let outcome = action.execute(&mut profile).await.unwrap();
    assert_eq!(outcome, IdentitySwitch::NoSwitch);
    assert!(profile.session().is_some());

    assert!(
        service
            .resolve_single(&SessionCriteria::session_id(&session_id))
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn construction_rejects_value_limit_too_small_for_records() {
    let caps = StorageCapabilities {
        context_size: 255,
        key_size: 255,
        value_size: 8,
    };

    // SP tracking needs room for serialized records.
    let storage = Arc::new(MemoryStorage::with_capabilities(caps));
    let err = StorageBackedSessionService::new(storage, SessionConfig::default()).unwrap_err();
    assert!(matches!(err, SessionError::Configuration { .. }));

    // Without tracking the limit is not relied on.
    let storage = Arc::new(MemoryStorage::with_capabilities(caps));
    let config = SessionConfig {
        track_sp_sessions: false,
        secondary_indexing: false,
        ..SessionConfig::default()
    };
    assert!(StorageBackedSessionService::new(storage, config).is_ok());
}

#[tokio::test]
async fn touch_after_destroy_does_not_recreate_master() {
    let (storage, service) = default_service();
    let mut ctx = RequestContext::with_remote_addr(client_addr());
    let mut session = service.create_session("alice", &mut ctx).await.unwrap();

    service
        .destroy_session(session.id(), false, None)
        .await
        .unwrap();

    // A late activity touch on a destroyed session is a silent no-op.
    service.touch_activity(&mut session).await.unwrap();
    assert!(
        storage
            .read(session.id(), "_session")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn resolve_current_request_without_cookie_is_empty() {
    let (_, service) = default_service();
    let request = RequestContext::with_remote_addr(client_addr());

    let criteria = service.criteria_for_request(&request);
    assert!(service.resolve(&criteria).await.unwrap().is_empty());
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session synchronizer tests against a fake identity provider.

use chatsync::db::{DocumentStore, MemoryDb};
use chatsync::error::AppError;
use chatsync::models::{CurrentUser, Session};
use chatsync::services::{IdTokenChange, IdentityProvider, IdpCredential, SessionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

mod common;
use common::{identity_for, FakeIdentity};

fn manager(identity: FakeIdentity) -> (SessionManager, Arc<FakeIdentity>, MemoryDb) {
    let identity = Arc::new(identity);
    let db = MemoryDb::new();
    let session = SessionManager::new(identity.clone(), Arc::new(db.clone()));
    (session, identity, db)
}

async fn wait_until<F>(rx: &mut watch::Receiver<Session>, pred: F) -> Session
where
    F: FnMut(&Session) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("Timed out waiting for session change")
        .expect("Session channel closed")
        .clone()
}

/// Assert the persisted copy of `uid` carries no token.
async fn assert_persisted_without_token(db: &MemoryDb, uid: &str, live_token: &str) {
    let stored = db
        .get_user(uid)
        .await
        .unwrap()
        .expect("User should be persisted");
    let json = serde_json::to_value(&stored).unwrap();

    assert!(!json.as_object().unwrap().contains_key("token"));
    assert!(!json.to_string().contains(live_token));
}

#[tokio::test]
async fn test_sign_in_with_email_without_redirect() {
    let (session, _, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    let outcome = session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();

    assert!(!outcome.user.uid.is_empty());
    assert_eq!(outcome.redirect, None);
    assert!(!session.loading());

    let snapshot = session.session();
    assert_eq!(snapshot.user, CurrentUser::SignedIn(outcome.user.clone()));
    assert_eq!(outcome.user.provider, "password");
    assert_eq!(outcome.user.email.as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn test_sign_in_returns_requested_redirect() {
    let (session, _, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    let outcome = session
        .sign_in_with_email("a@x.com", "pw", Some("/chat/c1".to_string()))
        .await
        .unwrap();

    assert_eq!(outcome.redirect.as_deref(), Some("/chat/c1"));
}

#[tokio::test]
async fn test_persisted_user_never_has_token() {
    let (session, identity, db) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    let signed_in = session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();
    assert_eq!(identity.current_token().as_deref(), Some(signed_in.user.token.as_str()));
    assert_persisted_without_token(&db, &signed_in.user.uid, &signed_in.user.token).await;

    let created = session
        .create_account("new@x.com", "secret1", None)
        .await
        .unwrap();
    assert_persisted_without_token(&db, &created.user.uid, &created.user.token).await;

    let federated = session
        .sign_in_with_provider(&IdpCredential::google("alice"), None)
        .await
        .unwrap();
    assert_eq!(federated.user.provider, "google.com");
    assert_eq!(federated.user.name.as_deref(), Some("Federated User"));
    assert_persisted_without_token(&db, &federated.user.uid, &federated.user.token).await;

    assert_eq!(db.user_count(), 3);
}

#[tokio::test]
async fn test_rejected_sign_in_clears_loading() {
    let (session, _, db) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    let err = session
        .sign_in_with_email("a@x.com", "wrong", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Identity(_)));
    assert!(err.is_credential_error());
    assert!(!session.loading());
    assert_eq!(session.session().user, CurrentUser::Loading);
    assert_eq!(db.user_count(), 0);
}

#[tokio::test]
async fn test_failed_create_keeps_current_user() {
    let (session, _, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));
    let outcome = session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();

    let err = session
        .create_account("a@x.com", "another1", None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Identity(ref m) if m == "EMAIL_EXISTS"));
    assert!(!session.loading());
    assert_eq!(session.session().user, CurrentUser::SignedIn(outcome.user));
}

#[tokio::test]
async fn test_sign_out_from_any_state() {
    let (session, _, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    // From the initial loading state
    session.sign_out().await.unwrap();
    assert_eq!(session.session().user, CurrentUser::SignedOut);
    assert!(!session.loading());

    // From signed in
    session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();
    session.sign_out().await.unwrap();
    assert_eq!(session.session().user, CurrentUser::SignedOut);

    // From signed out
    session.sign_out().await.unwrap();
    assert_eq!(session.session().user, CurrentUser::SignedOut);
}

#[tokio::test]
async fn test_fresh_token_is_stable_without_provider_events() {
    let (session, _, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));

    assert_eq!(session.get_fresh_token().await.unwrap(), "");

    let outcome = session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();
    let first = session.get_fresh_token().await.unwrap();
    let second = session.get_fresh_token().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first, outcome.user.token);

    session.sign_out().await.unwrap();
    assert_eq!(session.get_fresh_token().await.unwrap(), "");
}

#[tokio::test]
async fn test_listener_publishes_initial_state() {
    let (session, _, _) = manager(FakeIdentity::new());
    assert_eq!(session.session(), Session::default());

    let mut rx = session.subscribe();
    let listener = session.listen();

    let snapshot = wait_until(&mut rx, |s| !s.loading).await;
    assert_eq!(snapshot.user, CurrentUser::SignedOut);

    listener.shutdown().await;
}

#[tokio::test]
async fn test_listener_picks_up_token_refresh() {
    let (session, identity, db) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));
    let mut rx = session.subscribe();
    let listener = session.listen();

    let outcome = session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();
    let old_token = outcome.user.token.clone();

    identity.refresh_token();
    let new_token = identity.current_token().unwrap();
    assert_ne!(new_token, old_token);

    let snapshot = wait_until(&mut rx, |s| {
        s.user.user().is_some_and(|u| u.token == new_token)
    })
    .await;
    assert!(!snapshot.loading);
    assert_persisted_without_token(&db, &outcome.user.uid, &new_token).await;

    listener.shutdown().await;
}

#[tokio::test]
async fn test_listener_follows_provider_sign_out() {
    let (session, identity, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));
    let mut rx = session.subscribe();
    let listener = session.listen();

    session
        .sign_in_with_email("a@x.com", "pw", None)
        .await
        .unwrap();
    wait_until(&mut rx, |s| matches!(s.user, CurrentUser::SignedIn(_))).await;

    identity.revoke();
    let snapshot = wait_until(&mut rx, |s| s.user == CurrentUser::SignedOut).await;
    assert!(!snapshot.loading);

    listener.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let (session, identity, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));
    let mut rx = session.subscribe();
    let listener = session.listen();
    wait_until(&mut rx, |s| !s.loading).await;

    listener.shutdown().await;

    // The provider signs in on its own; nobody is listening any more.
    identity.sign_in_with_email("a@x.com", "pw").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.session().user, CurrentUser::SignedOut);
}

#[tokio::test]
async fn test_stale_sign_in_change_keeps_current_user() {
    let (session, identity, db) = manager(
        FakeIdentity::new()
            .with_account("a@x.com", "pw")
            .with_account("b@x.com", "pw"),
    );
    let mut rx = session.subscribe();
    let listener = session.listen();
    wait_until(&mut rx, |s| !s.loading).await;

    let b = identity.sign_in_with_email("b@x.com", "pw").await.unwrap();
    let settled = wait_until(&mut rx, |s| s.user.user().is_some_and(|u| u.uid == b.uid)).await;

    // A change for A arrives after B already holds the token
    let a = identity_for("a@x.com", "password");
    identity.emit(IdTokenChange::SignedIn(a.clone()));
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("Timed out waiting for session change")
        .expect("Session channel closed");

    assert_eq!(session.session().user, settled.user);
    assert!(db.get_user(&a.uid).await.unwrap().is_none());

    listener.shutdown().await;
}

#[tokio::test]
async fn test_quick_account_switch_never_mixes_users() {
    let (session, identity, db) = manager(
        FakeIdentity::new()
            .with_account("a@x.com", "pw")
            .with_account("b@x.com", "pw"),
    );
    let mut rx = session.subscribe();
    let listener = session.listen();

    // All three changes queue up before the listener gets to run
    let a = identity.sign_in_with_email("a@x.com", "pw").await.unwrap();
    let a_token = identity.current_token().unwrap();
    identity.sign_out().await.unwrap();
    let b = identity.sign_in_with_email("b@x.com", "pw").await.unwrap();
    let b_token = identity.current_token().unwrap();

    wait_until(&mut rx, |s| s.user.user().is_some_and(|u| u.uid == b.uid)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = session.session();
    let user = snapshot.user.user().expect("B should be signed in");
    assert_eq!(user.uid, b.uid);
    assert_eq!(user.token, b_token);

    // A's record, if written at all, carries A's own expiry
    if let Some(stored) = db.get_user(&a.uid).await.unwrap() {
        let a_expiry = chatsync::services::identity::decode_id_token(&a_token)
            .unwrap()
            .expiration_time;
        assert_eq!(stored.expiration_time, a_expiry);
    }

    listener.shutdown().await;
}

#[tokio::test]
async fn test_lagged_listener_resyncs_from_provider() {
    let (session, identity, _) = manager(FakeIdentity::new().with_account("a@x.com", "pw"));
    let mut rx = session.subscribe();
    let listener = session.listen();
    wait_until(&mut rx, |s| !s.loading).await;
    assert_eq!(identity.current_user_calls(), 1);

    // More changes than the channel holds, with no chance for the listener to run
    identity.sign_in_with_email("a@x.com", "pw").await.unwrap();
    for _ in 0..20 {
        identity.refresh_token();
    }
    let latest = identity.current_token().unwrap();

    let snapshot = wait_until(&mut rx, |s| {
        s.user.user().is_some_and(|u| u.token == latest)
    })
    .await;
    assert!(!snapshot.loading);
    // Once at start-up, once for the lag
    assert_eq!(identity.current_user_calls(), 2);

    listener.shutdown().await;
}

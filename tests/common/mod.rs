// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use chatsync::config::Config;
use chatsync::db::{FirestoreDb, MemoryDb};
use chatsync::error::AppError;
use chatsync::models::{IdTokenResult, ProviderInfo, RawIdentity};
use chatsync::routes::create_router;
use chatsync::services::identity::decode_id_token;
use chatsync::services::{IdTokenChange, IdentityProvider, IdpCredential, SessionManager};
use chatsync::AppState;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Mint an unsigned-for-our-purposes ID token with Firebase-shaped claims.
#[allow(dead_code)]
pub fn mint_id_token(uid: &str, provider: &str, serial: u64) -> String {
    let iat = 1_760_443_200 + serial as i64;
    let claims = json!({
        "sub": uid,
        "iat": iat,
        "exp": iat + 3600,
        "firebase": { "sign_in_provider": provider },
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"fake-identity-provider"),
    )
    .expect("Failed to mint ID token")
}

struct Account {
    password: String,
    identity: RawIdentity,
}

/// In-memory identity provider that behaves like Firebase Auth.
#[allow(dead_code)]
pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<(RawIdentity, String)>>,
    events: broadcast::Sender<IdTokenChange>,
    serial: AtomicU64,
    current_user_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeIdentity {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            events,
            serial: AtomicU64::new(0),
            current_user_calls: AtomicUsize::new(0),
        }
    }

    /// Register an email/password account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        let identity = identity_for(email, "password");
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity,
            },
        );
        self
    }

    fn mint(&self, identity: &RawIdentity) -> String {
        let serial = self.serial.fetch_add(1, Ordering::SeqCst);
        let provider = identity
            .provider_data
            .first()
            .map(|p| p.provider_id.as_str())
            .unwrap_or("password");
        mint_id_token(&identity.uid, provider, serial)
    }

    fn make_current(&self, identity: RawIdentity) -> RawIdentity {
        let token = self.mint(&identity);
        *self.current.lock().unwrap() = Some((identity.clone(), token));
        let _ = self.events.send(IdTokenChange::SignedIn(identity.clone()));
        identity
    }

    /// The live token, as the provider sees it.
    pub fn current_token(&self) -> Option<String> {
        self.current.lock().unwrap().as_ref().map(|(_, t)| t.clone())
    }

    /// Simulate a background token refresh.
    pub fn refresh_token(&self) {
        let identity = {
            let mut guard = self.current.lock().unwrap();
            let Some((identity, token)) = guard.as_mut() else {
                return;
            };
            let serial = self.serial.fetch_add(1, Ordering::SeqCst);
            *token = mint_id_token(&identity.uid, "password", serial);
            identity.clone()
        };
        let _ = self.events.send(IdTokenChange::Refreshed(identity));
    }

    /// Deliver an arbitrary change, e.g. one that arrives late.
    pub fn emit(&self, change: IdTokenChange) {
        let _ = self.events.send(change);
    }

    /// How often the session asked for the current user.
    pub fn current_user_calls(&self) -> usize {
        self.current_user_calls.load(Ordering::SeqCst)
    }

    /// Simulate the provider ending the session on its own.
    pub fn revoke(&self) {
        if self.current.lock().unwrap().take().is_some() {
            let _ = self.events.send(IdTokenChange::SignedOut);
        }
    }
}

#[allow(dead_code)]
pub fn identity_for(email: &str, provider: &str) -> RawIdentity {
    RawIdentity {
        uid: format!("uid-{}", email.replace(['@', '.'], "-")),
        email: Some(email.to_string()),
        display_name: None,
        photo_url: None,
        provider_data: vec![ProviderInfo {
            provider_id: provider.to_string(),
        }],
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn create_user_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RawIdentity, AppError> {
        let identity = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.contains_key(email) {
                return Err(AppError::Identity("EMAIL_EXISTS".to_string()));
            }
            let identity = identity_for(email, "password");
            accounts.insert(
                email.to_string(),
                Account {
                    password: password.to_string(),
                    identity: identity.clone(),
                },
            );
            identity
        };
        Ok(self.make_current(identity))
    }

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RawIdentity, AppError> {
        let identity = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => {
                    return Err(AppError::Identity(
                        AppError::INVALID_CREDENTIALS.to_string(),
                    ))
                }
            }
        };
        Ok(self.make_current(identity))
    }

    async fn sign_in_with_idp(&self, credential: &IdpCredential) -> Result<RawIdentity, AppError> {
        let Some(token) = credential.id_token.as_deref() else {
            return Err(AppError::Identity("INVALID_IDP_RESPONSE".to_string()));
        };
        let mut identity = identity_for(&format!("{token}@gmail.com"), &credential.provider_id);
        identity.display_name = Some("Federated User".to_string());
        identity.photo_url = Some("https://example.com/photo.jpg".to_string());
        Ok(self.make_current(identity))
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        self.revoke();
        Ok(())
    }

    async fn current_user(&self) -> Option<RawIdentity> {
        self.current_user_calls.fetch_add(1, Ordering::SeqCst);
        self.current.lock().unwrap().as_ref().map(|(i, _)| i.clone())
    }

    async fn id_token(&self, _force_refresh: bool) -> Result<Option<String>, AppError> {
        Ok(self.current_token())
    }

    async fn id_token_result(
        &self,
        force_refresh: bool,
    ) -> Result<Option<IdTokenResult>, AppError> {
        match self.id_token(force_refresh).await? {
            Some(token) => decode_id_token(&token).map(Some),
            None => Ok(None),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<IdTokenChange> {
        self.events.subscribe()
    }
}

/// Test app wired to a fake identity provider and an in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub identity: Arc<FakeIdentity>,
    pub db: MemoryDb,
}

/// Create a test app with offline dependencies. No listener runs, so the
/// session only changes through explicit calls.
#[allow(dead_code)]
pub fn create_test_app(identity: FakeIdentity) -> TestApp {
    let identity = Arc::new(identity);
    let db = MemoryDb::new();
    let session = SessionManager::new(identity.clone(), Arc::new(db.clone()));
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(db.clone()),
        session,
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        identity,
        db,
    }
}

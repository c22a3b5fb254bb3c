// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client (Identity Toolkit REST API).
//!
//! Handles:
//! - Email/password sign-up and sign-in
//! - Federated sign-in (`accounts:signInWithIdp`)
//! - ID token caching and refresh-token grants
//! - Token-change notifications for the session listener

use crate::config::Config;
use crate::error::AppError;
use crate::models::{IdTokenResult, ProviderInfo, RawIdentity};
use crate::services::identity::{decode_id_token, IdTokenChange, IdentityProvider, IdpCredential};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
/// Cached tokens closer than this to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 5 * 60;
const REFRESH_POLL_INTERVAL: Duration = Duration::from_secs(60);
const EVENT_CAPACITY: usize = 16;

/// Signed-in state held by the client. Never persisted.
#[derive(Clone)]
struct AuthSession {
    identity: RawIdentity,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl AuthSession {
    fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS) <= now
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    id_token: String,
    refresh_token: String,
    /// Seconds, as a string
    expires_in: String,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    email: Option<String>,
    display_name: Option<String>,
    photo_url: Option<String>,
    #[serde(default)]
    provider_user_info: Vec<ProviderInfo>,
}

impl From<AccountInfo> for RawIdentity {
    fn from(info: AccountInfo) -> Self {
        Self {
            uid: info.local_id,
            email: info.email,
            display_name: info.display_name,
            photo_url: info.photo_url,
            provider_data: info.provider_user_info,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Firebase Auth REST client.
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    api_key: String,
    identity_url: String,
    token_url: String,
    /// `requestUri` sent with federated sign-ins
    request_uri: String,
    session: RwLock<Option<AuthSession>>,
    events: broadcast::Sender<IdTokenChange>,
}

impl FirebaseAuthClient {
    /// Create a client for the configured project.
    ///
    /// For local development with the Auth emulator, set FIREBASE_AUTH_EMULATOR_HOST.
    pub fn new(config: &Config) -> Self {
        let request_uri = format!("https://{}", config.firebase.auth_domain);

        match &config.auth_emulator_host {
            Some(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                Self::with_base_urls(
                    &config.firebase.api_key,
                    &format!("http://{}/identitytoolkit.googleapis.com/v1", host),
                    &format!("http://{}/securetoken.googleapis.com/v1", host),
                    &request_uri,
                )
            }
            None => Self::with_base_urls(
                &config.firebase.api_key,
                IDENTITY_TOOLKIT_URL,
                SECURE_TOKEN_URL,
                &request_uri,
            ),
        }
    }

    /// Create a client against explicit endpoints.
    pub fn with_base_urls(
        api_key: &str,
        identity_url: &str,
        token_url: &str,
        request_uri: &str,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.to_string(),
            identity_url: identity_url.trim_end_matches('/').to_string(),
            token_url: token_url.trim_end_matches('/').to_string(),
            request_uri: request_uri.to_string(),
            session: RwLock::new(None),
            events,
        }
    }

    /// Call an `accounts:*` method of the Identity Toolkit API.
    async fn post_accounts<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, AppError> {
        let url = format!("{}/accounts:{}", self.identity_url, method);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("{} request failed: {}", method, e)))?;

        check_response_json(response).await
    }

    /// Look up the account behind a fresh sign-in and make it current.
    async fn establish(&self, tokens: SignInResponse) -> Result<RawIdentity, AppError> {
        let lookup: LookupResponse = self
            .post_accounts("lookup", json!({ "idToken": tokens.id_token }))
            .await?;

        let identity: RawIdentity = lookup
            .users
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Identity("USER_NOT_FOUND".to_string()))?
            .into();

        let session = AuthSession {
            identity: identity.clone(),
            id_token: tokens.id_token,
            refresh_token: tokens.refresh_token,
            expires_at: expiry_from(&tokens.expires_in)?,
        };
        *self.session.write().await = Some(session);

        tracing::info!(uid = %identity.uid, "Signed in to Firebase");
        let _ = self.events.send(IdTokenChange::SignedIn(identity.clone()));

        Ok(identity)
    }

    /// Exchange the refresh token for a new ID token.
    ///
    /// Only `notify` refreshes are broadcast; on-demand refreshes issued
    /// while handling a notification must not trigger another one.
    async fn refresh(&self, notify: bool) -> Result<Option<String>, AppError> {
        let Some(refresh_token) = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
        else {
            return Ok(None);
        };

        let url = format!("{}/token", self.token_url);
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Identity(format!("Token refresh request failed: {}", e)))?;

        let refreshed: RefreshResponse = check_response_json(response).await?;
        let expires_at = expiry_from(&refreshed.expires_in)?;

        let identity = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                // Signed out (or switched user) while the request was in flight
                Some(session) if session.identity.uid == refreshed.user_id => {
                    session.id_token = refreshed.id_token.clone();
                    session.refresh_token = refreshed.refresh_token;
                    session.expires_at = expires_at;
                    session.identity.clone()
                }
                _ => return Ok(None),
            }
        };

        tracing::debug!(uid = %identity.uid, "ID token refreshed");
        if notify {
            let _ = self.events.send(IdTokenChange::Refreshed(identity));
        }

        Ok(Some(refreshed.id_token))
    }

    async fn refresh_due(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|s| s.refresh_due(Utc::now()))
    }

    /// How long the refresher may sleep before the token needs attention.
    async fn time_until_refresh(&self) -> Duration {
        let guard = self.session.read().await;
        let Some(session) = guard.as_ref() else {
            return REFRESH_POLL_INTERVAL;
        };
        let due = session.expires_at - chrono::Duration::seconds(REFRESH_MARGIN_SECS);
        (due - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(REFRESH_POLL_INTERVAL)
    }

    /// Spawn the task that refreshes the ID token before it expires and
    /// broadcasts [`IdTokenChange::Refreshed`].
    pub fn spawn_refresher(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut wait = self.time_until_refresh().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                wait = if self.refresh_due().await {
                    match self.refresh(true).await {
                        Ok(_) => self.time_until_refresh().await,
                        Err(e) => {
                            tracing::warn!(error = %e, "Background token refresh failed");
                            REFRESH_POLL_INTERVAL
                        }
                    }
                } else {
                    self.time_until_refresh().await
                };
            }
            tracing::debug!("Token refresher stopped");
        })
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn create_user_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RawIdentity, AppError> {
        let tokens: SignInResponse = self
            .post_accounts(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(tokens).await
    }

    async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RawIdentity, AppError> {
        let tokens: SignInResponse = self
            .post_accounts(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        self.establish(tokens).await
    }

    async fn sign_in_with_idp(&self, credential: &IdpCredential) -> Result<RawIdentity, AppError> {
        let token_part = match (&credential.id_token, &credential.access_token) {
            (Some(id_token), _) => format!("id_token={}", urlencoding::encode(id_token)),
            (None, Some(access_token)) => {
                format!("access_token={}", urlencoding::encode(access_token))
            }
            (None, None) => {
                return Err(AppError::BadRequest(
                    "Federated credential has no token".to_string(),
                ))
            }
        };
        let post_body = format!(
            "{}&providerId={}",
            token_part,
            urlencoding::encode(&credential.provider_id)
        );

        let tokens: SignInResponse = self
            .post_accounts(
                "signInWithIdp",
                json!({
                    "postBody": post_body,
                    "requestUri": self.request_uri,
                    "returnSecureToken": true,
                    "returnIdpCredential": true,
                }),
            )
            .await?;
        self.establish(tokens).await
    }

    async fn sign_out(&self) -> Result<(), AppError> {
        let previous = self.session.write().await.take();
        if let Some(session) = previous {
            tracing::info!(uid = %session.identity.uid, "Signed out of Firebase");
            let _ = self.events.send(IdTokenChange::SignedOut);
        }
        Ok(())
    }

    async fn current_user(&self) -> Option<RawIdentity> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.identity.clone())
    }

    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>, AppError> {
        {
            let guard = self.session.read().await;
            match guard.as_ref() {
                None => return Ok(None),
                Some(session) if !force_refresh && !session.refresh_due(Utc::now()) => {
                    return Ok(Some(session.id_token.clone()));
                }
                Some(_) => {}
            }
        }
        self.refresh(false).await
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

fn expiry_from(expires_in: &str) -> Result<DateTime<Utc>, AppError> {
    let secs: i64 = expires_in
        .trim()
        .parse()
        .map_err(|_| AppError::Identity(format!("Invalid expiresIn: {}", expires_in)))?;
    Ok(Utc::now() + chrono::Duration::seconds(secs))
}

/// Check response status and parse the JSON body, surfacing Firebase's
/// error code (e.g. `INVALID_PASSWORD`) on failure.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status, body));
        tracing::debug!(status = status.as_u16(), error = %message, "Firebase Auth rejected request");
        return Err(AppError::Identity(message));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| AppError::Identity(format!("Failed to parse Firebase response: {}", e)))
}

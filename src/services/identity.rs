// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider abstraction.

use crate::error::AppError;
use crate::models::{IdTokenResult, RawIdentity};
use crate::time_utils::format_epoch_secs;
use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::broadcast;

/// Notification from the identity provider that the current ID token changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdTokenChange {
    SignedIn(RawIdentity),
    /// Same user, new token
    Refreshed(RawIdentity),
    SignedOut,
}

impl IdTokenChange {
    pub fn into_identity(self) -> Option<RawIdentity> {
        match self {
            IdTokenChange::SignedIn(raw) | IdTokenChange::Refreshed(raw) => Some(raw),
            IdTokenChange::SignedOut => None,
        }
    }
}

/// Credential from a federated provider's consent flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpCredential {
    /// e.g. "google.com"
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl IdpCredential {
    pub fn google(id_token: impl Into<String>) -> Self {
        Self {
            provider_id: "google.com".to_string(),
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }
}

/// Operations the session needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        password: &str,
    ) -> Result<RawIdentity, AppError>;

    async fn sign_in_with_email(&self, email: &str, password: &str)
        -> Result<RawIdentity, AppError>;

    async fn sign_in_with_idp(&self, credential: &IdpCredential)
        -> Result<RawIdentity, AppError>;

    /// Succeeds when nobody is signed in.
    async fn sign_out(&self) -> Result<(), AppError>;

    async fn current_user(&self) -> Option<RawIdentity>;

    /// ID token of the current user; `None` when signed out.
    async fn id_token(&self, force_refresh: bool) -> Result<Option<String>, AppError>;

    async fn id_token_result(
        &self,
        force_refresh: bool,
    ) -> Result<Option<IdTokenResult>, AppError>;

    /// Receive every future [`IdTokenChange`].
    fn subscribe(&self) -> broadcast::Receiver<IdTokenChange>;
}

#[derive(Debug, Deserialize)]
struct FirebaseClaim {
    #[serde(default)]
    sign_in_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    exp: i64,
    iat: i64,
    #[serde(default)]
    firebase: Option<FirebaseClaim>,
}

/// Read the claims of an ID token the provider just issued.
///
/// The signature is not checked here; the token came straight from the
/// provider over TLS and is only used to describe the session.
pub fn decode_id_token(token: &str) -> Result<IdTokenResult, AppError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims::<&str>(&[]);

    let claims = decode::<IdTokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| AppError::Identity(format!("Malformed ID token: {}", e)))?
        .claims;

    Ok(IdTokenResult {
        token: token.to_string(),
        uid: claims.sub,
        expiration_time: format_epoch(claims.exp)?,
        issued_at_time: format_epoch(claims.iat)?,
        sign_in_provider: claims.firebase.and_then(|f| f.sign_in_provider),
    })
}

fn format_epoch(secs: i64) -> Result<String, AppError> {
    format_epoch_secs(secs)
        .ok_or_else(|| AppError::Identity(format!("ID token timestamp out of range: {}", secs)))
}

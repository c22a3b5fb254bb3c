// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for the session and for storage.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Provider id used when a record has no linked provider.
pub const DEFAULT_PROVIDER_ID: &str = "firebase";

/// A provider that an identity record is linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    /// e.g. "password", "google.com"
    pub provider_id: String,
}

/// Identity record as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub provider_data: Vec<ProviderInfo>,
}

/// Decoded ID token for the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTokenResult {
    pub token: String,
    /// `sub` claim: the uid the token was issued to
    pub uid: String,
    /// RFC 3339, `Z` suffix
    pub expiration_time: String,
    /// RFC 3339, `Z` suffix
    pub issued_at_time: String,
    pub sign_in_provider: Option<String>,
}

/// Application user, built on every identity-state change.
///
/// Carries the live ID token and therefore never goes to the document store
/// directly; see [`User::without_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Provider-assigned id (also used as document ID)
    pub uid: String,
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
    pub photo_url: Option<String>,
    /// First linked provider id
    pub provider: String,
    pub token: String,
    pub expiration_time: String,
}

impl User {
    /// Normalize a provider record and its token into a [`User`].
    pub fn from_identity(raw: &RawIdentity, token: IdTokenResult) -> Self {
        let provider = raw
            .provider_data
            .first()
            .map(|p| p.provider_id.clone())
            .unwrap_or_else(|| DEFAULT_PROVIDER_ID.to_string());

        Self {
            uid: raw.uid.clone(),
            email: raw.email.clone(),
            name: raw.display_name.clone(),
            photo_url: raw.photo_url.clone(),
            provider,
            token: token.token,
            expiration_time: token.expiration_time,
        }
    }

    /// The persistable copy of this user.
    pub fn without_token(&self) -> StoredUser {
        StoredUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            photo_url: self.photo_url.clone(),
            provider: self.provider.clone(),
            expiration_time: self.expiration_time.clone(),
        }
    }
}

/// User profile stored in Firestore (`users/{uid}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub provider: String,
    pub expiration_time: String,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod conversation;
pub mod firebase_auth;
pub mod identity;
pub mod session;

pub use conversation::ConversationLoader;
pub use firebase_auth::FirebaseAuthClient;
pub use identity::{IdTokenChange, IdentityProvider, IdpCredential};
pub use session::{AuthOutcome, SessionListener, SessionManager};

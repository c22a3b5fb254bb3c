// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod chat;
pub mod session;
pub mod user;

pub use chat::{Chat, ChatPage, Message, NewMessage, StoredMessage};
pub use session::{CurrentUser, Session, SessionStatus, SessionView};
pub use user::{IdTokenResult, ProviderInfo, RawIdentity, StoredUser, User};

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory session state.

use super::user::{StoredUser, User};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Who is signed in, as far as the session knows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CurrentUser {
    /// No identity event has been handled yet
    #[default]
    Loading,
    SignedOut,
    SignedIn(User),
}

impl CurrentUser {
    pub fn user(&self) -> Option<&User> {
        match self {
            CurrentUser::SignedIn(user) => Some(user),
            _ => None,
        }
    }
}

/// Session snapshot published to the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: CurrentUser,
    pub loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: CurrentUser::Loading,
            loading: true,
        }
    }
}

impl Session {
    pub fn view(&self) -> SessionView {
        let (status, user) = match &self.user {
            CurrentUser::Loading => (SessionStatus::Loading, None),
            CurrentUser::SignedOut => (SessionStatus::SignedOut, None),
            CurrentUser::SignedIn(user) => (SessionStatus::SignedIn, Some(user.without_token())),
        };
        SessionView {
            status,
            user,
            loading: self.loading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    SignedOut,
    SignedIn,
}

/// Serializable session, without the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionView {
    pub status: SessionStatus,
    pub user: Option<StoredUser>,
    pub loading: bool,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation and message models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A conversation between participants (exactly two for a direct chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Chat {
    /// Document ID
    pub id: String,
    /// Participant ids
    pub users: Vec<String>,
}

impl Chat {
    /// The first participant other than `me`.
    pub fn recipient(&self, me: &str) -> Option<&str> {
        self.users
            .iter()
            .map(String::as_str)
            .find(|u| !same_participant(u, me))
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.users.iter().any(|u| same_participant(u, id))
    }
}

/// Emails compare case-insensitively; uids exactly.
fn same_participant(a: &str, b: &str) -> bool {
    if a.contains('@') {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

/// Message as persisted under `chats/{id}/messages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Document ID
    pub id: String,
    /// Sender id
    pub user: String,
    /// Body
    pub message: String,
    pub photo_url: Option<String>,
    /// Written by the store at append time
    pub timestamp: DateTime<Utc>,
}

/// A message about to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub user: String,
    pub message: String,
    pub photo_url: Option<String>,
}

/// Message as handed to the client, timestamp in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Message {
    pub id: String,
    pub user: String,
    pub message: String,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none", default)]
    pub photo_url: Option<String>,
    pub timestamp: i64,
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Self {
            id: stored.id,
            user: stored.user,
            message: stored.message,
            photo_url: stored.photo_url,
            timestamp: stored.timestamp.timestamp_millis(),
        }
    }
}

/// Payload for a conversation page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ChatPage {
    pub chat: Chat,
    pub messages: Vec<Message>,
    /// The other participant, from the signed-in user's point of view
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub recipient: Option<String>,
}

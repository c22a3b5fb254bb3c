// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conversation loader: one chat plus its full message history.

use crate::db::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{ChatPage, Message, StoredMessage};
use std::sync::Arc;

#[derive(Clone)]
pub struct ConversationLoader {
    store: Arc<dyn DocumentStore>,
}

impl ConversationLoader {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Load a chat and all of its messages, oldest first.
    ///
    /// Fails with [`AppError::NotFound`] if the chat does not exist; any
    /// store failure fails the whole load.
    pub async fn load(&self, chat_id: &str) -> Result<ChatPage> {
        let stored = self.store.list_messages(chat_id).await?;
        let chat = self
            .store
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("chat {}", chat_id)))?;

        let messages = normalize_messages(stored);
        tracing::debug!(chat_id, count = messages.len(), "Conversation loaded");

        Ok(ChatPage {
            chat,
            messages,
            recipient: None,
        })
    }
}

/// Order messages by timestamp (stable for equal timestamps) and convert
/// them to the client form.
pub fn normalize_messages(mut stored: Vec<StoredMessage>) -> Vec<Message> {
    stored.sort_by_key(|m| m.timestamp);
    stored.into_iter().map(Message::from).collect()
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory document store with Firestore's observable semantics
//! (keyed upsert, ordered sub-collection reads, empty reads of missing
//! parents). Used by tests and offline runs.

use crate::db::DocumentStore;
use crate::error::AppError;
use crate::models::{Chat, NewMessage, StoredMessage, StoredUser};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct MemoryDb {
    users: Arc<DashMap<String, StoredUser>>,
    chats: Arc<DashMap<String, Chat>>,
    messages: Arc<DashMap<String, Vec<StoredMessage>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-padded so ids sort in creation order.
    fn generate_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{n:010}")
    }

    /// Store a chat under its own id.
    pub fn insert_chat(&self, chat: Chat) {
        self.chats.insert(chat.id.clone(), chat);
    }

    /// Store a message as-is, keeping its id and timestamp.
    pub fn insert_message(&self, chat_id: &str, message: StoredMessage) {
        self.messages
            .entry(chat_id.to_string())
            .or_default()
            .push(message);
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryDb {
    async fn upsert_user(&self, user: &StoredUser) -> Result<(), AppError> {
        self.users.insert(user.uid.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<StoredUser>, AppError> {
        Ok(self.users.get(uid).map(|u| u.value().clone()))
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError> {
        Ok(self.chats.get(chat_id).map(|c| c.value().clone()))
    }

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, AppError> {
        let mut messages = self
            .messages
            .get(chat_id)
            .map(|m| m.value().clone())
            .unwrap_or_default();
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    async fn create_chat(&self, users: Vec<String>) -> Result<Chat, AppError> {
        let chat = Chat {
            id: self.generate_id("chat"),
            users,
        };
        self.insert_chat(chat.clone());
        Ok(chat)
    }

    async fn list_chats_for(&self, participant: &str) -> Result<Vec<Chat>, AppError> {
        let mut chats: Vec<Chat> = self
            .chats
            .iter()
            .filter(|c| c.value().has_participant(participant))
            .map(|c| c.value().clone())
            .collect();
        chats.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(chats)
    }

    async fn add_message(
        &self,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage, AppError> {
        let stored = StoredMessage {
            id: self.generate_id("msg"),
            user: message.user,
            message: message.message,
            photo_url: message.photo_url,
            timestamp: Utc::now(),
        };
        self.insert_message(chat_id, stored.clone());
        Ok(stored)
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore, plus an in-memory store for tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Chat, NewMessage, StoredMessage, StoredUser};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHATS: &str = "chats";
    /// Sub-collection of each `chats/{id}` document
    pub const MESSAGES: &str = "messages";
}

/// Document store operations the application relies on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite `users/{uid}`.
    async fn upsert_user(&self, user: &StoredUser) -> Result<(), AppError>;

    async fn get_user(&self, uid: &str) -> Result<Option<StoredUser>, AppError>;

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError>;

    /// All messages of a chat, oldest first.
    async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, AppError>;

    async fn create_chat(&self, users: Vec<String>) -> Result<Chat, AppError>;

    /// Chats whose `users` contain `participant`.
    async fn list_chats_for(&self, participant: &str) -> Result<Vec<Chat>, AppError>;

    /// Append a message; the store assigns its id and timestamp.
    async fn add_message(
        &self,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage, AppError>;
}

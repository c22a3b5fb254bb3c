// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (token-stripped profile copies)
//! - Chats (participant lists)
//! - Messages (append-only sub-collection of each chat)

use crate::db::{collections, DocumentStore};
use crate::error::AppError;
use crate::models::{Chat, NewMessage, StoredMessage, StoredUser};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `chats/{id}` as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatDocument {
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    id: String,
    users: Vec<String>,
}

impl From<ChatDocument> for Chat {
    fn from(doc: ChatDocument) -> Self {
        Self {
            id: doc.id,
            users: doc.users,
        }
    }
}

/// `chats/{id}/messages/{id}` as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageDocument {
    #[serde(alias = "_firestore_id", default, skip_serializing)]
    id: String,
    user: String,
    message: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    photo_url: Option<String>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    timestamp: DateTime<Utc>,
}

impl From<MessageDocument> for StoredMessage {
    fn from(doc: MessageDocument) -> Self {
        Self {
            id: doc.id,
            user: doc.user,
            message: doc.message,
            photo_url: doc.photo_url,
            timestamp: doc.timestamp,
        }
    }
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a disconnected client; every operation fails.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    fn chat_path(&self, chat_id: &str) -> Result<firestore::ParentPathBuilder, AppError> {
        self.get_client()?
            .parent_path(collections::CHATS, chat_id)
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl DocumentStore for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn upsert_user(&self, user: &StoredUser) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<StoredUser>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Chat Operations ─────────────────────────────────────────

    async fn get_chat(&self, chat_id: &str) -> Result<Option<Chat>, AppError> {
        let doc: Option<ChatDocument> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CHATS)
            .obj()
            .one(chat_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(doc.map(Chat::from))
    }

    async fn create_chat(&self, users: Vec<String>) -> Result<Chat, AppError> {
        let doc = ChatDocument {
            id: String::new(),
            users,
        };

        let created: ChatDocument = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::CHATS)
            .generate_document_id()
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::info!(chat_id = %created.id, "Chat created");
        Ok(created.into())
    }

    async fn list_chats_for(&self, participant: &str) -> Result<Vec<Chat>, AppError> {
        let participant = participant.to_string();

        let docs: Vec<ChatDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::CHATS)
            .filter(move |q| q.field("users").array_contains(participant.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs.into_iter().map(Chat::from).collect())
    }

    // ─── Message Operations ──────────────────────────────────────

    async fn list_messages(&self, chat_id: &str) -> Result<Vec<StoredMessage>, AppError> {
        let parent = self.chat_path(chat_id)?;

        let docs: Vec<MessageDocument> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::MESSAGES)
            .parent(&parent)
            .order_by([("timestamp", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs.into_iter().map(StoredMessage::from).collect())
    }

    async fn add_message(
        &self,
        chat_id: &str,
        message: NewMessage,
    ) -> Result<StoredMessage, AppError> {
        let parent = self.chat_path(chat_id)?;
        let doc = MessageDocument {
            id: String::new(),
            user: message.user,
            message: message.message,
            photo_url: message.photo_url,
            timestamp: Utc::now(),
        };

        let created: MessageDocument = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::MESSAGES)
            .generate_document_id()
            .parent(&parent)
            .object(&doc)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!(chat_id, message_id = %created.id, "Message appended");
        Ok(created.into())
    }
}

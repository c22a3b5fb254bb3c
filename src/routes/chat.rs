// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat routes (require a signed-in session).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::AuthUser;
use crate::models::{Chat, ChatPage, Message, NewMessage};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chats", get(list_chats).post(create_chat))
        .route("/chat/{id}", get(get_chat))
        .route("/chat/{id}/messages", post(send_message))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(email)]
    recipient: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4096))]
    message: String,
}

/// GET /chats - conversations the signed-in user takes part in.
async fn list_chats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Chat>>> {
    let chats = state.store.list_chats_for(user.participant_id()).await?;
    Ok(Json(chats))
}

/// POST /chats - start a direct chat with another user.
async fn create_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<Chat>)> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let me = user.participant_id();
    let recipient = req.recipient.to_ascii_lowercase();
    if recipient == me {
        return Err(AppError::BadRequest(
            "cannot start a chat with yourself".to_string(),
        ));
    }

    let existing = state.store.list_chats_for(me).await?;
    if existing.iter().any(|c| c.has_participant(&recipient)) {
        return Err(AppError::BadRequest(format!(
            "chat with {} already exists",
            recipient
        )));
    }

    let chat = state
        .store
        .create_chat(vec![me.to_string(), recipient])
        .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /chat/{id} - the chat with its full, ordered message history.
async fn get_chat(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatPage>> {
    let mut page = state.conversations.load(&chat_id).await?;

    let me = user.participant_id();
    if !page.chat.has_participant(me) {
        return Err(AppError::NotFound(format!("chat {}", chat_id)));
    }
    page.recipient = page.chat.recipient(me).map(str::to_string);

    Ok(Json(page))
}

/// POST /chat/{id}/messages - append a message.
async fn send_message(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(chat_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let me = user.participant_id();
    let chat = state
        .store
        .get_chat(&chat_id)
        .await?
        .filter(|c| c.has_participant(me))
        .ok_or_else(|| AppError::NotFound(format!("chat {}", chat_id)))?;

    let photo_url = state
        .session
        .session()
        .user
        .user()
        .and_then(|u| u.photo_url.clone());

    let stored = state
        .store
        .add_message(
            &chat.id,
            NewMessage {
                user: me.to_string(),
                message: req.message,
                photo_url,
            },
        )
        .await?;

    tracing::info!(chat_id = %chat.id, message_id = %stored.id, "Message sent");
    Ok((StatusCode::CREATED, Json(Message::from(stored))))
}

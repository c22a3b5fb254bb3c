// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! chatsync: session and conversation backend for a Firebase chat client
//!
//! This crate keeps the signed-in user in sync with Firebase Authentication
//! and serves conversations, with their ordered message history, out of
//! Cloud Firestore.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::DocumentStore;
use services::{ConversationLoader, SessionManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub session: SessionManager,
    pub conversations: ConversationLoader,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn DocumentStore>, session: SessionManager) -> Self {
        Self {
            config,
            conversations: ConversationLoader::new(store.clone()),
            store,
            session,
        }
    }
}

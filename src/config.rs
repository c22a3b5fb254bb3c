// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! The six Firebase project parameters are required; the server refuses to
//! start without them.

use std::env;

/// Connection parameters for the Firebase project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    /// Web API key (used as `?key=` on Auth REST calls)
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub firebase: FirebaseConfig,
    /// Frontend URL; redirects outside it are rejected
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Firebase Auth emulator (`host:port`), if running locally
    pub auth_emulator_host: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let firebase = FirebaseConfig {
            api_key: required("FIREBASE_API_KEY")?,
            auth_domain: required("FIREBASE_AUTH_DOMAIN")?,
            project_id: required("FIREBASE_PROJECT_ID")?,
            storage_bucket: required("FIREBASE_STORAGE_BUCKET")?,
            messaging_sender_id: required("FIREBASE_MESSAGING_SENDER_ID")?,
            app_id: required("FIREBASE_APP_ID")?,
        };

        Ok(Self {
            firebase,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            auth_emulator_host: env::var("FIREBASE_AUTH_EMULATOR_HOST")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        })
    }

    /// Config for tests, pointed at a non-existent project.
    pub fn test_default() -> Self {
        Self {
            firebase: FirebaseConfig {
                api_key: "test-api-key".to_string(),
                auth_domain: "test-project.firebaseapp.com".to_string(),
                project_id: "test-project".to_string(),
                storage_bucket: "test-project.appspot.com".to_string(),
                messaging_sender_id: "000000000000".to_string(),
                app_id: "1:000000000000:web:0000000000000000".to_string(),
            },
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
            auth_emulator_host: None,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

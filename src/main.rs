// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! chatsync page server
//!
//! Keeps the signed-in user in sync with Firebase Authentication and serves
//! conversations out of Firestore.

use chatsync::{
    config::Config,
    db::{DocumentStore, FirestoreDb},
    services::{FirebaseAuthClient, IdentityProvider, SessionManager},
    AppState,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        project = %config.firebase.project_id,
        "Starting chatsync"
    );

    let store: Arc<dyn DocumentStore> =
        Arc::new(FirestoreDb::new(&config.firebase.project_id).await?);

    let auth_client = Arc::new(FirebaseAuthClient::new(&config));
    let shutdown = CancellationToken::new();
    let refresher = auth_client.clone().spawn_refresher(shutdown.child_token());
    let identity: Arc<dyn IdentityProvider> = auth_client;

    // Session listener runs for the lifetime of the server
    let (session, listener) = SessionManager::start(identity, store.clone());
    tracing::info!("Session listener started");

    let state = Arc::new(AppState::new(config.clone(), store, session));
    let app = chatsync::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down");
    listener.shutdown().await;
    shutdown.cancel();
    refresher.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chatsync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}

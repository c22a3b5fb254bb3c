// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session synchronizer.
//!
//! Mirrors the identity provider's state into a [`Session`] observable and
//! keeps a token-stripped copy of the signed-in user in the document store.
//! Explicit sign-in calls and the background listener both funnel through
//! the same normalize / persist / publish step, so whichever finishes last
//! wins.

use crate::db::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, RawIdentity, Session, User};
use crate::services::identity::{IdentityProvider, IdpCredential};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Result of a successful sign-in or account creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub user: User,
    /// Where the caller asked to be sent afterwards
    pub redirect: Option<String>,
}

struct Inner {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
    state: watch::Sender<Session>,
}

/// Process-wide session handle. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Create a session in the `Loading` state without a listener.
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self {
            inner: Arc::new(Inner {
                identity,
                store,
                state,
            }),
        }
    }

    /// Create a session and start listening for token changes.
    pub fn start(
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> (Self, SessionListener) {
        let manager = Self::new(identity, store);
        let listener = manager.listen();
        (manager, listener)
    }

    /// Spawn the token-change listener.
    ///
    /// The listener first handles the provider's current user, then every
    /// notification until the returned [`SessionListener`] is shut down.
    pub fn listen(&self) -> SessionListener {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        // Subscribe before the initial sync so no change slips in between.
        let mut events = self.inner.identity.subscribe();
        let manager = self.clone();

        let handle = tokio::spawn(async move {
            let current = manager.inner.identity.current_user().await;
            manager.sync(current).await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(change) => {
                            let raw = match change.into_identity() {
                                Some(raw) => Some(raw),
                                // A sign-in may already have followed this sign-out
                                None => manager.inner.identity.current_user().await,
                            };
                            manager.sync(raw).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Session listener lagged, resyncing");
                            let current = manager.inner.identity.current_user().await;
                            manager.sync(current).await;
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
            tracing::debug!("Session listener stopped");
        });

        SessionListener {
            cancel,
            handle: Some(handle),
        }
    }

    /// Current snapshot.
    pub fn session(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    /// Receive every future session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
        redirect: Option<String>,
    ) -> Result<AuthOutcome> {
        let identity = self.inner.identity.clone();
        self.run_sign_in(
            async move { identity.create_user_with_email(email, password).await },
            redirect,
        )
        .await
    }

    pub async fn sign_in_with_email(
        &self,
        email: &str,
        password: &str,
        redirect: Option<String>,
    ) -> Result<AuthOutcome> {
        let identity = self.inner.identity.clone();
        self.run_sign_in(
            async move { identity.sign_in_with_email(email, password).await },
            redirect,
        )
        .await
    }

    pub async fn sign_in_with_provider(
        &self,
        credential: &IdpCredential,
        redirect: Option<String>,
    ) -> Result<AuthOutcome> {
        let identity = self.inner.identity.clone();
        self.run_sign_in(
            async move { identity.sign_in_with_idp(credential).await },
            redirect,
        )
        .await
    }

    /// Sign out at the provider and publish `SignedOut`.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.identity.sign_out().await?;
        self.handle_user(None).await?;
        Ok(())
    }

    /// The current user's cached ID token, or an empty string when signed out.
    pub async fn get_fresh_token(&self) -> Result<String> {
        Ok(self
            .inner
            .identity
            .id_token(false)
            .await?
            .unwrap_or_default())
    }

    async fn run_sign_in<F>(&self, sign_in: F, redirect: Option<String>) -> Result<AuthOutcome>
    where
        F: Future<Output = Result<RawIdentity>>,
    {
        self.inner.state.send_modify(|s| s.loading = true);

        let result = async {
            let raw = sign_in.await?;
            self.handle_user(Some(raw))
                .await?
                .ok_or(AppError::Unauthorized)
        }
        .await;

        match result {
            Ok(user) => Ok(AuthOutcome { user, redirect }),
            Err(e) => {
                if e.is_credential_error() {
                    tracing::debug!(error = %e, "Sign-in rejected");
                } else {
                    tracing::warn!(error = %e, "Sign-in failed");
                }
                self.inner.state.send_modify(|s| s.loading = false);
                Err(e)
            }
        }
    }

    /// Listener-side handling: failures are logged, never propagated.
    async fn sync(&self, raw: Option<RawIdentity>) {
        if let Err(e) = self.handle_user(raw).await {
            tracing::warn!(error = %e, "Failed to handle identity change");
            self.inner.state.send_modify(|s| s.loading = false);
        }
    }

    /// Normalize, persist and publish an identity change.
    ///
    /// Returns the published user, or `None` if the session is now signed out
    /// or the change was superseded before it could be handled.
    async fn handle_user(&self, raw: Option<RawIdentity>) -> Result<Option<User>> {
        // A missing token means the user signed out after the change fired.
        let user = match raw {
            Some(raw) => match self.inner.identity.id_token_result(false).await? {
                Some(token) if token.uid == raw.uid => Some(User::from_identity(&raw, token)),
                Some(token) => {
                    // The change is stale: the provider already holds another user's token.
                    tracing::debug!(
                        uid = %raw.uid,
                        current = %token.uid,
                        "Ignoring stale identity change"
                    );
                    let current = self
                        .inner
                        .identity
                        .current_user()
                        .await
                        .filter(|current| current.uid == token.uid);
                    match current {
                        Some(current) => Some(User::from_identity(&current, token)),
                        // Still moving; a later change carries the settled user
                        None => return Ok(None),
                    }
                }
                None => None,
            },
            None => None,
        };

        let Some(user) = user else {
            self.publish(CurrentUser::SignedOut);
            return Ok(None);
        };

        if let Err(e) = self.inner.store.upsert_user(&user.without_token()).await {
            tracing::warn!(uid = %user.uid, error = %e, "Failed to persist user profile");
        }

        tracing::debug!(uid = %user.uid, provider = %user.provider, "Session user updated");
        self.publish(CurrentUser::SignedIn(user.clone()));
        Ok(Some(user))
    }

    fn publish(&self, user: CurrentUser) {
        self.inner.state.send_modify(|s| {
            s.user = user;
            s.loading = false;
        });
    }
}

/// Handle to the background listener; stops it when shut down or dropped.
pub struct SessionListener {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SessionListener {
    /// Stop the listener and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Session listener task failed");
            }
        }
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication middleware.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Signed-in user, inserted into request extensions by [`require_session`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
}

impl AuthUser {
    /// Identifier used in chat participant lists (the lowercased email when
    /// known).
    pub fn participant_id(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }
}

/// Middleware that requires a signed-in session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_user = {
        let session = state.session.session();
        let user = session.user.user().ok_or(StatusCode::UNAUTHORIZED)?;
        AuthUser {
            uid: user.uid.clone(),
            email: user.email.as_deref().map(str::to_ascii_lowercase),
        }
    };

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes: sign-up, sign-in, sign-out, session and token reads.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::SessionView;
use crate::services::{AuthOutcome, IdpCredential};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signin/idp", post(sign_in_idp))
        .route("/auth/signout", post(sign_out))
        .route("/auth/session", get(current_session))
        .route("/auth/token", get(fresh_token))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    email: String,
    /// Firebase refuses shorter passwords
    #[validate(length(min = 6))]
    password: String,
    #[serde(default)]
    redirect: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
    #[serde(default)]
    redirect: Option<String>,
}

fn default_provider() -> String {
    "google.com".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct IdpSignInRequest {
    #[serde(default = "default_provider")]
    #[validate(length(min = 1))]
    provider_id: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    redirect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<Response> {
    validate(&req)?;
    let redirect = check_redirect(req.redirect, &state.config.frontend_url)?;

    let outcome = state
        .session
        .create_account(&req.email, &req.password, redirect)
        .await?;

    tracing::info!(uid = %outcome.user.uid, "Account created");
    Ok(respond(&state, outcome))
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<Response> {
    validate(&req)?;
    let redirect = check_redirect(req.redirect, &state.config.frontend_url)?;

    let outcome = state
        .session
        .sign_in_with_email(&req.email, &req.password, redirect)
        .await?;

    tracing::info!(uid = %outcome.user.uid, "Signed in with email");
    Ok(respond(&state, outcome))
}

async fn sign_in_idp(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdpSignInRequest>,
) -> Result<Response> {
    validate(&req)?;
    if req.id_token.is_none() && req.access_token.is_none() {
        return Err(AppError::BadRequest(
            "id_token or access_token is required".to_string(),
        ));
    }
    let redirect = check_redirect(req.redirect, &state.config.frontend_url)?;

    let credential = IdpCredential {
        provider_id: req.provider_id,
        id_token: req.id_token,
        access_token: req.access_token,
    };
    let outcome = state
        .session
        .sign_in_with_provider(&credential, redirect)
        .await?;

    tracing::info!(
        uid = %outcome.user.uid,
        provider = %outcome.user.provider,
        "Signed in with federated provider"
    );
    Ok(respond(&state, outcome))
}

async fn sign_out(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>> {
    state.session.sign_out().await?;
    Ok(Json(state.session.session().view()))
}

async fn current_session(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    Json(state.session.session().view())
}

async fn fresh_token(State(state): State<Arc<AppState>>) -> Result<Response> {
    let token = state.session.get_fresh_token().await?;
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(TokenResponse { token }),
    )
        .into_response())
}

/// Navigate to the requested target, or hand back the session.
fn respond(state: &AppState, outcome: AuthOutcome) -> Response {
    match outcome.redirect {
        Some(target) => Redirect::to(&target).into_response(),
        None => Json(state.session.session().view()).into_response(),
    }
}

fn validate<T: Validate>(req: &T) -> Result<()> {
    req.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Accept local paths and URLs under the frontend; reject everything else.
fn check_redirect(redirect: Option<String>, frontend_url: &str) -> Result<Option<String>> {
    let Some(target) = redirect.filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    // Browsers read `\` as `/`, so `/\host` would leave the site
    let is_local_path = target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && !target.chars().any(char::is_control);
    let frontend = frontend_url.trim_end_matches('/');
    let under_frontend = target
        .strip_prefix(frontend)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));

    if is_local_path || under_frontend {
        Ok(Some(target))
    } else {
        tracing::warn!(redirect = %target, "Rejected redirect outside the frontend");
        Err(AppError::BadRequest(format!(
            "redirect not allowed: {}",
            target
        )))
    }
}

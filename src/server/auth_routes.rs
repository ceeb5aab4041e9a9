//! Local-strategy endpoints under `/api/auth`.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::extract::{clear_session_headers, session_headers, session_token, CurrentIdentity};
use super::AppState;
use crate::error::AppResult;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPayload {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

pub async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> AppResult<(HeaderMap, Json<Value>)> {
    // username falls back to the email address
    let username = payload
        .username
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .or(payload.email.as_deref())
        .unwrap_or_default();
    let identity = state
        .verifier
        .register(username, payload.email.as_deref(), payload.display_name.as_deref(), &payload.password)
        .await?;
    let session = state.gate.login(&identity);
    Ok((
        session_headers(&session.token)?,
        Json(json!({"status": "ok", "message": "Registered successfully", "user": identity.public()})),
    ))
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<(HeaderMap, Json<Value>)> {
    let identity = state.verifier.verify(&payload.username, &payload.password).await?;
    let session = state.gate.login(&identity);
    Ok((
        session_headers(&session.token)?,
        Json(json!({"status": "ok", "message": "Logged in successfully", "user": identity.public()})),
    ))
}

fn end_session(state: &AppState, headers: &HeaderMap) {
    if let Some(token) = session_token(headers) {
        state.gate.logout(&token);
    }
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> (HeaderMap, Json<Value>) {
    end_session(&state, &headers);
    (clear_session_headers(), Json(json!({"status": "ok", "message": "Logged out successfully"})))
}

pub async fn logout_redirect(State(state): State<AppState>, headers: HeaderMap) -> (HeaderMap, Redirect) {
    end_session(&state, &headers);
    (clear_session_headers(), Redirect::to("/"))
}

pub async fn current_user(CurrentIdentity(identity): CurrentIdentity) -> Json<Value> {
    Json(json!({"user": identity.public()}))
}

//! Delegated-strategy endpoints. A provider that was not enabled at startup
//! answers with `provider_not_configured` instead of starting a handshake.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use serde::Deserialize;
use tracing::info;

use super::extract::session_headers;
use super::AppState;
use crate::error::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub async fn start(State(state): State<AppState>, Path(provider): Path<String>) -> AppResult<Redirect> {
    let strategy = state.registry.strategy(&provider)?;
    let token = state.oauth_states.issue(strategy.provider);
    Ok(Redirect::to(&strategy.authorize_url(&token)))
}

pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> AppResult<(HeaderMap, Redirect)> {
    let strategy = state.registry.strategy(&provider)?;
    if let Some(err) = query.error {
        return Err(AppError::auth("oauth_denied", format!("{} login failed: {}", strategy.provider.label(), err)));
    }
    let state_ok = query.state.as_deref().is_some_and(|s| state.oauth_states.take(s, strategy.provider));
    if !state_ok {
        return Err(AppError::auth("invalid_oauth_state", "OAuth state is missing or expired"));
    }
    let code = query
        .code
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::auth("missing_code", "OAuth callback carried no authorization code"))?;

    let assertion = state.exchange.exchange(strategy, &code).await?;
    let identity = state.resolver.resolve(&assertion).await?;
    let session = state.gate.login(&identity);
    info!(target: "spendwise::http", "{} login identity={}", strategy.provider.label(), identity.id);
    Ok((session_headers(&session.token)?, Redirect::to("/dashboard")))
}

//! Unified application error model for the HTTP edge.
//! Domain errors from the identity core map into `AppError`, which carries a
//! stable machine code, a user-facing message and an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tracing::{debug, error};

use crate::identity::{
    ExchangeError, RegistrationError, ResolutionError, SessionError, StrategyError, Unauthorized, VerificationError,
};
use crate::storage::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Auth { code: String, message: String },
    Upstream { code: String, message: String },
    Unavailable { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Auth { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Auth { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Unavailable { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn auth<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Auth { code: code.into(), message: msg.into() } }
    pub fn upstream<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn unavailable<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Unavailable { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Auth { .. } => 401,
            AppError::Upstream { .. } => 502,
            AppError::Unavailable { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::unavailable("store_unavailable", msg),
            other => AppError::internal("store_error", other.to_string()),
        }
    }
}

impl From<VerificationError> for AppError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::InvalidCredentials => AppError::auth("invalid_credentials", "Invalid credentials"),
            VerificationError::Store(e) => e.into(),
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::UsernameTaken(_) => AppError::conflict("username_taken", "User already exists"),
            RegistrationError::InvalidInput(msg) => AppError::user("invalid_registration", msg),
            RegistrationError::Hash(msg) => AppError::internal("password_hash_failed", msg),
            RegistrationError::Store(e) => e.into(),
        }
    }
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::LinkConflict { provider, .. } => AppError::conflict(
                "link_conflict",
                format!("This account's email is already linked to a different {} account.", provider.label()),
            ),
            ResolutionError::StoreUnavailable(msg) => AppError::unavailable("store_unavailable", msg),
            ResolutionError::InvalidAssertion(msg) => AppError::upstream("invalid_profile", msg),
            e @ ResolutionError::UsernameSpaceExhausted(_) => AppError::internal("username_exhausted", e.to_string()),
            ResolutionError::Store(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownIdentity(_) => Unauthorized.into(),
            SessionError::Store(e) => e.into(),
        }
    }
}

impl From<Unauthorized> for AppError {
    fn from(_: Unauthorized) -> Self { AppError::auth("not_authenticated", "Not authenticated") }
}

impl From<StrategyError> for AppError {
    fn from(err: StrategyError) -> Self {
        match &err {
            StrategyError::ProviderNotConfigured(_) => AppError::not_found("provider_not_configured", err.to_string()),
            StrategyError::UnknownStrategy(_) => AppError::not_found("unknown_strategy", err.to_string()),
        }
    }
}

impl From<ExchangeError> for AppError {
    fn from(err: ExchangeError) -> Self { AppError::upstream("oauth_exchange_failed", err.to_string()) }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(target: "spendwise::http", "{} {}", status.as_u16(), self);
        } else {
            debug!(target: "spendwise::http", "{} {}", status.as_u16(), self);
        }
        let body = serde_json::json!({"status": "error", "code": self.code_str(), "message": self.message()});
        (status, Json(body)).into_response()
    }
}

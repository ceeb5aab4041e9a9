//!
//! spendwise HTTP surface
//! ----------------------
//! Axum routes over the identity core. Pages and business CRUD live elsewhere;
//! this module only exposes what those collaborators need:
//! - Local register/login/logout and current-user lookup under `/api/auth`.
//! - Delegated login start/callback under `/auth/{provider}`.
//! - Session token carried in an HttpOnly cookie, resolved by [`CurrentIdentity`].

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::config::AuthConfig;
use crate::identity::{AuthGate, CredentialVerifier, HttpProfileExchange, IdentityResolver, ProfileExchange, SessionStore, StrategyRegistry};
use crate::storage::{MemoryIdentityStore, SharedIdentityStore};

pub mod auth_routes;
pub mod oauth_routes;
mod extract;
mod oauth_state;

pub use extract::{session_token, CurrentIdentity, SESSION_COOKIE};
pub use oauth_state::PendingStates;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<StrategyRegistry>,
    pub verifier: CredentialVerifier,
    pub resolver: Arc<IdentityResolver>,
    pub gate: Arc<AuthGate>,
    pub exchange: Arc<dyn ProfileExchange>,
    pub oauth_states: Arc<PendingStates>,
}

impl AppState {
    pub fn new(config: &AuthConfig, store: SharedIdentityStore, exchange: Arc<dyn ProfileExchange>) -> Self {
        let sessions = Arc::new(SessionStore::new(config.session_ttl()));
        Self {
            registry: Arc::new(StrategyRegistry::register(config)),
            verifier: CredentialVerifier::new(store.clone()),
            resolver: Arc::new(IdentityResolver::new(store.clone())),
            gate: Arc::new(AuthGate::new(store, sessions)),
            exchange,
            oauth_states: Arc::new(PendingStates::default()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "spendwise ok" }))
        .route("/api/auth/register", post(auth_routes::register))
        .route("/api/auth/login", post(auth_routes::login))
        .route("/api/auth/logout", get(auth_routes::logout))
        .route("/api/auth/user", get(auth_routes::current_user))
        .route("/auth/logout", post(auth_routes::logout_redirect))
        .route("/auth/{provider}", get(oauth_routes::start))
        .route("/auth/{provider}/callback", get(oauth_routes::callback))
        .with_state(state)
}

/// Start the HTTP server with an in-memory identity store.
pub async fn run(config: AuthConfig) -> anyhow::Result<()> {
    let store: SharedIdentityStore = Arc::new(MemoryIdentityStore::new());
    let exchange = Arc::new(HttpProfileExchange::new().context("While building the OAuth HTTP client")?);
    let state = AppState::new(&config, store, exchange);
    info!(target: "startup", "enabled strategies: {:?}", state.registry.enabled());

    let addr: SocketAddr = format!("{}:{}", config.bind_addr, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.bind_addr, config.port))?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

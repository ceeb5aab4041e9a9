//! HTTP integration tests: local register/login/logout, the authentication
//! gate on `/api/auth/user`, and the delegated start/callback handshake with a
//! stubbed provider exchange.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use spendwise::config::{AuthConfig, ProviderCredentials};
use spendwise::identity::{DelegatedProfileAssertion, ExchangeError, ProfileExchange, Provider, ProviderStrategy};
use spendwise::server::{router, AppState};
use spendwise::storage::{MemoryIdentityStore, SharedIdentityStore};

struct StubExchange(DelegatedProfileAssertion);

#[async_trait]
impl ProfileExchange for StubExchange {
    async fn exchange(&self, _strategy: &ProviderStrategy, code: &str) -> Result<DelegatedProfileAssertion, ExchangeError> {
        if code == "bad" {
            return Err(ExchangeError::Rejected("bad_verification_code".into()));
        }
        Ok(self.0.clone())
    }
}

fn app() -> (Router, MemoryIdentityStore) {
    let config = AuthConfig {
        github: ProviderCredentials {
            client_id: Some("gh-client".into()),
            client_secret: Some("gh-secret".into()),
            callback_url: None,
        },
        ..AuthConfig::default()
    };
    let memory = MemoryIdentityStore::new();
    let store: SharedIdentityStore = Arc::new(memory.clone());
    let exchange = Arc::new(StubExchange(DelegatedProfileAssertion {
        provider: Provider::GitHub,
        external_id: "583231".into(),
        candidate_username: Some("octocat".into()),
        display_name: Some("The Octocat".into()),
        emails: vec!["octo@x.com".into()],
    }));
    (router(AppState::new(&config, store, exchange)), memory)
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.expect("router is infallible")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method(Method::GET).uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b.body(Body::empty()).unwrap()
}

async fn body_json(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// `name=value` part of the Set-Cookie header.
fn session_cookie(resp: &Response) -> String {
    let raw = resp.headers().get(header::SET_COOKIE).expect("set-cookie").to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

fn location(resp: &Response) -> String {
    resp.headers().get(header::LOCATION).expect("location").to_str().unwrap().to_string()
}

#[tokio::test]
async fn register_login_user_logout_round_trip() {
    let (app, store) = app();

    let resp = send(&app, post_json("/api/auth/register", json!({
        "username": "bob", "email": "bob@x.com", "displayName": "Bob", "password": "pw"
    })))
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = session_cookie(&resp);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["username"], "bob");
    assert_eq!(body["user"]["displayName"], "Bob");
    assert!(body["user"].get("password").is_none());

    let resp = send(&app, get("/api/auth/user", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["user"]["email"], "bob@x.com");

    let resp = send(&app, get("/api/auth/logout", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_cookie(&resp).ends_with("=deleted"));

    let resp = send(&app, get("/api/auth/user", Some(&cookie))).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Not authenticated");

    let resp = send(&app, post_json("/api/auth/login", json!({"username": "bob", "password": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let fresh = session_cookie(&resp);
    assert_ne!(fresh, cookie);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn register_defaults_username_to_email_and_rejects_duplicates() {
    let (app, _) = app();
    let resp = send(&app, post_json("/api/auth/register", json!({"email": "dee@x.com", "name": "Dee", "password": "pw"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["user"]["username"], "dee@x.com");
    assert_eq!(body["user"]["displayName"], "Dee");

    let resp = send(&app, post_json("/api/auth/register", json!({"username": "dee@x.com", "password": "other"}))).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["message"], "User already exists");
}

#[tokio::test]
async fn bad_credentials_look_the_same_for_unknown_and_wrong_password() {
    let (app, _) = app();
    send(&app, post_json("/api/auth/register", json!({"username": "bob", "password": "right"}))).await;

    let unknown = send(&app, post_json("/api/auth/login", json!({"username": "ghost", "password": "x"}))).await;
    let wrong = send(&app, post_json("/api/auth/login", json!({"username": "bob", "password": "wrongpassword"}))).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(unknown.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(body_json(unknown).await, body_json(wrong).await);
}

#[tokio::test]
async fn unconfigured_provider_reports_not_configured() {
    let (app, _) = app();
    for uri in ["/auth/google", "/auth/google/callback?code=x&state=y"] {
        let resp = send(&app, get(uri, None)).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["code"], "provider_not_configured");
        assert_eq!(body["message"], "Google OAuth is not configured on this server.");
    }
    let resp = send(&app, get("/auth/myspace", None)).await;
    assert_eq!(body_json(resp).await["code"], "unknown_strategy");
}

#[cfg(feature = "github")]
#[tokio::test]
async fn github_handshake_logs_in_and_state_is_single_use() {
    let (app, store) = app();

    let resp = send(&app, get("/auth/github", None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let to = location(&resp);
    assert!(to.starts_with("https://github.com/login/oauth/authorize?client_id=gh-client&"));
    assert!(to.contains("redirect_uri=http%3A%2F%2Flocalhost%3A5000%2Fauth%2Fgithub%2Fcallback"));
    let state = to.split("state=").nth(1).expect("state param").to_string();

    let callback = format!("/auth/github/callback?code=abc&state={}", state);
    let resp = send(&app, get(&callback, None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = session_cookie(&resp);

    let user = body_json(send(&app, get("/api/auth/user", Some(&cookie))).await).await;
    assert_eq!(user["user"]["username"], "octocat");
    assert_eq!(user["user"]["displayName"], "The Octocat");

    // replayed state is refused
    let resp = send(&app, get(&callback, None)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["code"], "invalid_oauth_state");
    assert_eq!(store.len(), 1);
}

#[cfg(feature = "github")]
#[tokio::test]
async fn github_callback_links_existing_local_account() {
    let (app, store) = app();
    send(&app, post_json("/api/auth/register", json!({"username": "octo", "email": "Octo@X.com", "password": "pw"}))).await;

    let state = location(&send(&app, get("/auth/github", None)).await).split("state=").nth(1).unwrap().to_string();
    let resp = send(&app, get(&format!("/auth/github/callback?code=abc&state={}", state), None)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);

    let all = store.all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].username, "octo");
    assert_eq!(all[0].link_for(Provider::GitHub), Some("583231"));
}

#[cfg(feature = "github")]
#[tokio::test]
async fn failed_exchange_is_a_bad_gateway() {
    let (app, store) = app();
    let state = location(&send(&app, get("/auth/github", None)).await).split("state=").nth(1).unwrap().to_string();
    let resp = send(&app, get(&format!("/auth/github/callback?code=bad&state={}", state), None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(resp).await["code"], "oauth_exchange_failed");
    assert!(store.is_empty());
}

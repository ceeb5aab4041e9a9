use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;

pub const SESSION_COOKIE: &str = "spendwise_session";

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for cookie in headers.get_all("cookie").iter() {
        let Ok(s) = cookie.to_str() else { continue; };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name && !v.is_empty() { return Some(v.to_string()); }
            }
        }
    }
    None
}

pub fn session_token(headers: &HeaderMap) -> Option<String> { parse_cookie(headers, SESSION_COOKIE) }

pub(crate) fn session_headers(token: &str) -> AppResult<HeaderMap> {
    let value = HeaderValue::from_str(&format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, token))
        .map_err(|e| AppError::internal("session_cookie", e.to_string()))?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

pub(crate) fn clear_session_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        SET_COOKIE,
        HeaderValue::from_static("spendwise_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Path=/"),
    );
    headers
}

/// The authenticated identity of the current request. Rejects with 401 when
/// the request carries no valid session.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers);
        let auth = state.gate.evaluate(token.as_deref()).await?;
        Ok(CurrentIdentity(auth.into_authenticated()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_cookie_among_others() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("theme=dark; spendwise_session=abc-123; lang=en"));
        assert_eq!(session_token(&h).as_deref(), Some("abc-123"));
        h.insert("cookie", HeaderValue::from_static("spendwise_session="));
        assert_eq!(session_token(&h), None);
    }

    #[test]
    fn cleared_cookie_has_the_session_name() {
        let h = clear_session_headers();
        let v = h.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(v.starts_with(&format!("{}=deleted", SESSION_COOKIE)));
    }
}

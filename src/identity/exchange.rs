//! Provider-specific code exchange: turns the `code` handed to an OAuth
//! callback into a [`DelegatedProfileAssertion`].

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::model::{DelegatedProfileAssertion, Provider};
use super::registry::ProviderStrategy;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the authorization code: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait ProfileExchange: Send + Sync {
    async fn exchange(&self, strategy: &ProviderStrategy, code: &str) -> Result<DelegatedProfileAssertion, ExchangeError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub id: u64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleUserInfo {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}

/// Verified addresses only, primary first, then the public profile email.
pub fn github_assertion(user: GitHubUser, mut emails: Vec<GitHubEmail>) -> DelegatedProfileAssertion {
    emails.retain(|e| e.verified);
    emails.sort_by_key(|e| !e.primary);
    let mut out: Vec<String> = emails.into_iter().map(|e| e.email).collect();
    if let Some(public) = user.email.filter(|e| !e.trim().is_empty()) {
        if !out.iter().any(|e| e.eq_ignore_ascii_case(&public)) { out.push(public); }
    }
    DelegatedProfileAssertion {
        provider: Provider::GitHub,
        external_id: user.id.to_string(),
        candidate_username: Some(user.login),
        display_name: user.name,
        emails: out,
    }
}

pub fn google_assertion(info: GoogleUserInfo) -> DelegatedProfileAssertion {
    DelegatedProfileAssertion {
        provider: Provider::Google,
        external_id: info.sub,
        candidate_username: None,
        display_name: info.name,
        emails: info.email.filter(|_| info.email_verified).into_iter().collect(),
    }
}

/// Live exchange against the providers' HTTP APIs.
#[derive(Clone)]
pub struct HttpProfileExchange {
    client: reqwest::Client,
}

impl HttpProfileExchange {
    pub fn new() -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("spendwise/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn access_token(&self, strategy: &ProviderStrategy, code: &str) -> Result<String, ExchangeError> {
        let form = [
            ("client_id", strategy.client_id.as_str()),
            ("client_secret", strategy.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", strategy.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];
        let resp: TokenResponse = self
            .client
            .post(strategy.client.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?
            .json()
            .await?;
        match resp.access_token {
            Some(token) => Ok(token),
            None => Err(ExchangeError::Rejected(
                resp.error_description.or(resp.error).unwrap_or_else(|| "no access token returned".to_string()),
            )),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, ExchangeError> {
        Ok(self.client.get(url).bearer_auth(token).send().await?.error_for_status()?.json().await?)
    }
}

#[async_trait]
impl ProfileExchange for HttpProfileExchange {
    async fn exchange(&self, strategy: &ProviderStrategy, code: &str) -> Result<DelegatedProfileAssertion, ExchangeError> {
        let token = self.access_token(strategy, code).await?;
        let assertion = match strategy.provider {
            Provider::GitHub => {
                let user: GitHubUser = self.get_json(strategy.client.profile_url, &token).await?;
                let emails = match strategy.client.emails_url {
                    Some(url) => self.get_json(url, &token).await?,
                    None => Vec::new(),
                };
                github_assertion(user, emails)
            }
            Provider::Google => google_assertion(self.get_json(strategy.client.profile_url, &token).await?),
        };
        debug!(target: "spendwise::exchange", "provider={} external_id={} emails={}", assertion.provider, assertion.external_id, assertion.emails.len());
        Ok(assertion)
    }
}

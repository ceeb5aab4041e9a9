use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use super::error::{ConfigurationError, StrategyError};
use super::model::Provider;
use crate::config::{AuthConfig, ProviderCredentials};

pub const LOCAL_STRATEGY: &str = "local";

/// Endpoints and scopes of a provider's OAuth client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderClient {
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    pub profile_url: &'static str,
    /// Separate endpoint listing the account's addresses, when the profile omits them.
    pub emails_url: Option<&'static str>,
    pub scopes: &'static [&'static str],
}

#[cfg(feature = "github")]
const GITHUB_CLIENT: Option<ProviderClient> = Some(ProviderClient {
    authorize_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    profile_url: "https://api.github.com/user",
    emails_url: Some("https://api.github.com/user/emails"),
    scopes: &["user:email"],
});
#[cfg(not(feature = "github"))]
const GITHUB_CLIENT: Option<ProviderClient> = None;

#[cfg(feature = "google")]
const GOOGLE_CLIENT: Option<ProviderClient> = Some(ProviderClient {
    authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    profile_url: "https://openidconnect.googleapis.com/v1/userinfo",
    emails_url: None,
    scopes: &["profile", "email"],
});
#[cfg(not(feature = "google"))]
const GOOGLE_CLIENT: Option<ProviderClient> = None;

fn load_client(provider: Provider) -> Result<ProviderClient, ConfigurationError> {
    let client = match provider {
        Provider::GitHub => GITHUB_CLIENT,
        Provider::Google => GOOGLE_CLIENT,
    };
    client.ok_or(ConfigurationError::ClientUnavailable { provider })
}

/// An enabled delegated provider: its client plus the credentials and
/// callback address used to complete the handshake.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderStrategy {
    pub provider: Provider,
    pub client: ProviderClient,
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl std::fmt::Debug for ProviderStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderStrategy")
            .field("provider", &self.provider)
            .field("client", &self.client)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl ProviderStrategy {
    /// Redirect target that starts the provider handshake.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.client.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.callback_url),
            urlencoding::encode(&self.client.scopes.join(" ")),
            urlencoding::encode(state),
        )
    }
}

pub fn default_callback_url(provider: Provider, port: u16) -> String {
    format!("http://localhost:{}/auth/{}/callback", port, provider.as_str())
}

fn enable(provider: Provider, creds: &ProviderCredentials, port: u16) -> Result<ProviderStrategy, ConfigurationError> {
    let client = load_client(provider)?;
    let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let client_id = present(&creds.client_id)
        .ok_or(ConfigurationError::MissingCredentials { provider, missing: "client id" })?;
    let client_secret = present(&creds.client_secret)
        .ok_or(ConfigurationError::MissingCredentials { provider, missing: "client secret" })?;
    let callback_url = present(&creds.callback_url).unwrap_or_else(|| default_callback_url(provider, port));
    Ok(ProviderStrategy { provider, client, client_id, client_secret, callback_url })
}

/// Authentication strategies enabled for this process. Built once at startup
/// and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    providers: BTreeMap<Provider, ProviderStrategy>,
}

impl StrategyRegistry {
    /// Enable local auth plus every fully configured provider. Providers that
    /// cannot be enabled are logged and skipped.
    pub fn register(config: &AuthConfig) -> Self {
        info!(target: "spendwise::registry", "registered local strategy");
        let mut providers = BTreeMap::new();
        for provider in Provider::ALL {
            match enable(provider, config.credentials(provider), config.port) {
                Ok(strategy) => {
                    info!(target: "spendwise::registry", "registered {} strategy (callback={})", provider.label(), strategy.callback_url);
                    providers.insert(provider, strategy);
                }
                Err(e) => warn!(target: "spendwise::registry", "{}", e),
            }
        }
        Self { providers }
    }

    pub fn enabled(&self) -> BTreeSet<&'static str> {
        std::iter::once(LOCAL_STRATEGY)
            .chain(self.providers.keys().map(Provider::as_str))
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool { self.enabled().contains(name) }

    pub fn provider(&self, provider: Provider) -> Result<&ProviderStrategy, StrategyError> {
        self.providers.get(&provider).ok_or(StrategyError::ProviderNotConfigured(provider))
    }

    /// Look up a delegated strategy by route name.
    pub fn strategy(&self, name: &str) -> Result<&ProviderStrategy, StrategyError> {
        let provider = Provider::from_name(name).ok_or_else(|| StrategyError::UnknownStrategy(name.to_string()))?;
        self.provider(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(id: Option<&str>, secret: Option<&str>) -> ProviderCredentials {
        ProviderCredentials {
            client_id: id.map(str::to_string),
            client_secret: secret.map(str::to_string),
            callback_url: None,
        }
    }

    #[test]
    fn local_is_always_enabled() {
        let reg = StrategyRegistry::register(&AuthConfig::default());
        assert_eq!(reg.enabled(), BTreeSet::from([LOCAL_STRATEGY]));
        assert_eq!(reg.strategy("github").unwrap_err(), StrategyError::ProviderNotConfigured(Provider::GitHub));
        assert_eq!(reg.strategy("twitter").unwrap_err(), StrategyError::UnknownStrategy("twitter".into()));
    }

    #[test]
    fn provider_needs_both_id_and_secret() {
        let cfg = AuthConfig {
            github: creds(Some("id"), None),
            google: creds(Some("gid"), Some("gsecret")),
            ..AuthConfig::default()
        };
        let reg = StrategyRegistry::register(&cfg);
        assert!(!reg.is_enabled("github"));
        #[cfg(feature = "google")]
        {
            assert!(reg.is_enabled("google"));
            let g = reg.strategy("google").unwrap();
            assert_eq!(g.callback_url, "http://localhost:5000/auth/google/callback");
        }
    }

    #[test]
    fn missing_credentials_name_what_is_absent() {
        let err = enable(Provider::GitHub, &creds(Some("id"), Some("  ")), 5000).unwrap_err();
        #[cfg(feature = "github")]
        assert_eq!(err, ConfigurationError::MissingCredentials { provider: Provider::GitHub, missing: "client secret" });
        #[cfg(not(feature = "github"))]
        assert_eq!(err, ConfigurationError::ClientUnavailable { provider: Provider::GitHub });
    }

    #[cfg(feature = "github")]
    #[test]
    fn configured_callback_overrides_default_and_builds_authorize_url() {
        let mut c = creds(Some("abc"), Some("shh"));
        c.callback_url = Some("https://spend.example/auth/github/callback".into());
        let s = enable(Provider::GitHub, &c, 5000).unwrap();
        let url = s.authorize_url("st8");
        assert!(url.starts_with("https://github.com/login/oauth/authorize?client_id=abc&"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fspend.example%2Fauth%2Fgithub%2Fcallback"));
        assert!(url.contains("scope=user%3Aemail"));
        assert!(url.ends_with("state=st8"));
        assert!(!url.contains("shh"));
        assert!(!format!("{:?}", s).contains("shh"));
        assert!(!format!("{:?}", StrategyRegistry { providers: BTreeMap::from([(Provider::GitHub, s)]) }).contains("shh"));
    }
}

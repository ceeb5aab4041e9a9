//! Startup configuration, read once from the environment and never reloaded.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identity::Provider;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

/// Client credentials for one delegated provider. A provider is only enabled
/// when both `client_id` and `client_secret` are present and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Overrides the conventional `http://localhost:{port}/auth/{provider}/callback`.
    #[serde(default)]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub bind_addr: String,
    pub port: u16,
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub github: ProviderCredentials,
    #[serde(default)]
    pub google: ProviderCredentials,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            github: ProviderCredentials::default(),
            google: ProviderCredentials::default(),
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = AuthConfig::default();
        if let Some(addr) = get("BIND_ADDR") { cfg.bind_addr = addr; }
        if let Some(port) = get("PORT") {
            cfg.port = port.parse().with_context(|| format!("PORT must be a TCP port number, got '{}'", port))?;
        }
        if let Some(ttl) = get("SESSION_TTL_SECS") {
            cfg.session_ttl_secs = ttl.parse().with_context(|| format!("SESSION_TTL_SECS must be a number of seconds, got '{}'", ttl))?;
        }
        for provider in Provider::ALL {
            let prefix = provider.as_str().to_ascii_uppercase();
            let creds = ProviderCredentials {
                client_id: get(&format!("{}_CLIENT_ID", prefix)),
                client_secret: get(&format!("{}_CLIENT_SECRET", prefix)),
                callback_url: get(&format!("{}_CALLBACK", prefix)),
            };
            match provider {
                Provider::GitHub => cfg.github = creds,
                Provider::Google => cfg.google = creds,
            }
        }
        Ok(cfg)
    }

    pub fn credentials(&self, provider: Provider) -> &ProviderCredentials {
        match provider {
            Provider::GitHub => &self.github,
            Provider::Google => &self.google,
        }
    }

    pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }
}

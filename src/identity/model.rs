use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Store-assigned identifier of an [`Identity`]. Immutable once issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(Uuid);

impl IdentityId {
    pub fn generate() -> Self { Self(Uuid::new_v4()) }
}

impl Display for IdentityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// Delegated identity providers this server knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::GitHub, Provider::Google];

    /// Stable strategy name, also used in routes and link keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    /// Human-facing name for messages.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Google => "Google",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Argon2 PHC string for a locally registered identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordCredential(String);

impl PasswordCredential {
    pub fn from_phc(phc: String) -> Self { Self(phc) }
    pub fn phc(&self) -> &str { &self.0 }
}

impl std::fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str("PasswordCredential(<redacted>)") }
}

pub type ProviderLinks = BTreeMap<Provider, String>;

/// A durable account record. Local and delegated accounts share this shape;
/// `password` is only present for local registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub password: Option<PasswordCredential>,
    #[serde(default)]
    pub provider_links: ProviderLinks,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn link_for(&self, provider: Provider) -> Option<&str> {
        self.provider_links.get(&provider).map(String::as_str)
    }

    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// Identity fields supplied by a caller; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIdentity {
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
    pub password: Option<PasswordCredential>,
    pub provider_links: ProviderLinks,
}

/// The account shape returned by the auth API. Carries no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIdentity {
    pub id: IdentityId,
    pub username: String,
    pub email: Option<String>,
    pub display_name: String,
}

/// Claims a delegated provider handed back about the authenticated party.
/// Consumed once by the resolver and never stored as such.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedProfileAssertion {
    pub provider: Provider,
    pub external_id: String,
    pub candidate_username: Option<String>,
    pub display_name: Option<String>,
    pub emails: Vec<String>,
}

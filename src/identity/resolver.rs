//! Resolves a delegated profile assertion to exactly one local identity.
//!
//! Order is fixed: an existing provider link wins, then an identity with a
//! matching email is linked, and only then is a new identity created under a
//! synthesized, collision-free username. Each `(provider, external_id)` is
//! resolved under its own lock stripe and created through the store's atomic
//! `insert_unless_linked`, so concurrent first logins converge on one identity.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::error::ResolutionError;
use super::model::{DelegatedProfileAssertion, Identity, NewIdentity, Provider, ProviderLinks};
use crate::storage::{SharedIdentityStore, StoreError, UniqueField, Upsert};

const LOCK_STRIPES: usize = 64;
/// Highest numeric suffix tried before giving up on a base username.
const MAX_USERNAME_SUFFIX: u32 = 10_000;

pub struct IdentityResolver {
    store: SharedIdentityStore,
    stripes: Vec<Mutex<()>>,
}

impl IdentityResolver {
    pub fn new(store: SharedIdentityStore) -> Self {
        Self { store, stripes: (0..LOCK_STRIPES).map(|_| Mutex::new(())).collect() }
    }

    fn stripe(&self, provider: Provider, external_id: &str) -> &Mutex<()> {
        let mut h = DefaultHasher::new();
        (provider, external_id).hash(&mut h);
        &self.stripes[(h.finish() as usize) % self.stripes.len()]
    }

    pub async fn resolve(&self, assertion: &DelegatedProfileAssertion) -> Result<Identity, ResolutionError> {
        let provider = assertion.provider;
        let external_id = assertion.external_id.trim();
        if external_id.is_empty() {
            return Err(ResolutionError::InvalidAssertion("external id is empty"));
        }
        let _guard = self.stripe(provider, external_id).lock().await;

        let out = self.resolve_locked(assertion, external_id).await;
        if let Err(e) = &out {
            match e {
                ResolutionError::LinkConflict { .. } => warn!(target: "spendwise::resolver", "provider={} external_id={} {}", provider, external_id, e),
                _ => error!(target: "spendwise::resolver", "provider={} external_id={} resolution failed: {}", provider, external_id, e),
            }
        }
        out
    }

    async fn resolve_locked(&self, assertion: &DelegatedProfileAssertion, external_id: &str) -> Result<Identity, ResolutionError> {
        let provider = assertion.provider;

        // 1) existing link, returned untouched
        if let Some(identity) = self.store.find_by_provider_link(provider, external_id).await? {
            debug!(target: "spendwise::resolver", "provider={} external_id={} matched identity={}", provider, external_id, identity.id);
            return Ok(identity);
        }

        // 2) same person registered another way with this email
        for email in assertion.emails.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let Some(identity) = self.store.find_by_email(email).await? else { continue; };
            return self.link(identity, provider, external_id).await;
        }

        // 3) new identity
        self.create(assertion, external_id).await
    }

    async fn link(&self, identity: Identity, provider: Provider, external_id: &str) -> Result<Identity, ResolutionError> {
        match identity.link_for(provider).map(|existing| existing == external_id) {
            Some(true) => return Ok(identity),
            Some(false) => return Err(ResolutionError::LinkConflict { identity: identity.id, provider }),
            None => {}
        }
        match self.store.link_provider(&identity.id, provider, external_id).await {
            Ok(linked) => {
                info!(target: "spendwise::resolver", "linked {} account {} to identity={} by email", provider.label(), external_id, linked.id);
                Ok(linked)
            }
            Err(StoreError::LinkExists(_)) => Err(ResolutionError::LinkConflict { identity: identity.id, provider }),
            Err(StoreError::UniqueViolation(UniqueField::ProviderLink(_))) => {
                // another resolver claimed this account after step 1
                match self.store.find_by_provider_link(provider, external_id).await? {
                    Some(holder) => {
                        debug!(target: "spendwise::resolver", "provider={} external_id={} linked concurrently to identity={}", provider, external_id, holder.id);
                        Ok(holder)
                    }
                    None => Err(StoreError::UniqueViolation(UniqueField::ProviderLink(provider)).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create(&self, assertion: &DelegatedProfileAssertion, external_id: &str) -> Result<Identity, ResolutionError> {
        let provider = assertion.provider;
        let base = base_username(assertion);
        let email = assertion
            .emails
            .iter()
            .map(|e| e.trim())
            .find(|e| !e.is_empty())
            .map(str::to_lowercase);
        let mut provider_links = ProviderLinks::new();
        provider_links.insert(provider, external_id.to_string());

        let mut next = 0u32;
        loop {
            let (username, after) = self.first_free_username(&base, next).await?;
            let display_name = non_blank(assertion.display_name.as_deref())
                .or_else(|| non_blank(assertion.candidate_username.as_deref()))
                .unwrap_or(username.as_str())
                .to_string();
            let new = NewIdentity {
                username: username.clone(),
                email: email.clone(),
                display_name,
                password: None,
                provider_links: provider_links.clone(),
            };
            match self.store.insert_unless_linked(provider, external_id, new).await {
                Ok(Upsert::Inserted(identity)) => {
                    info!(target: "spendwise::resolver", "created identity={} username={} for {} account {}", identity.id, identity.username, provider.label(), external_id);
                    return Ok(identity);
                }
                Ok(Upsert::Existing(identity)) => return Ok(identity),
                Err(StoreError::UniqueViolation(UniqueField::Username)) => {
                    debug!(target: "spendwise::resolver", "username {} taken concurrently, retrying", username);
                    next = after;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Probe `base`, `base0`, `base1`, ... starting at position `from` (0 is the
    /// bare base). Returns the free name and the position after it.
    async fn first_free_username(&self, base: &str, from: u32) -> Result<(String, u32), ResolutionError> {
        for pos in from..=MAX_USERNAME_SUFFIX.saturating_add(1) {
            let candidate = username_at(base, pos);
            if self.store.find_by_username(&candidate).await?.is_none() {
                return Ok((candidate, pos + 1));
            }
        }
        Err(ResolutionError::UsernameSpaceExhausted(base.to_string()))
    }
}

fn username_at(base: &str, pos: u32) -> String {
    match pos {
        0 => base.to_string(),
        n => format!("{}{}", base, n - 1),
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> { s.map(str::trim).filter(|s| !s.is_empty()) }

/// Whitespace removed, lowercased; `None` when nothing is left.
pub fn normalize_username(raw: &str) -> Option<String> {
    let out: String = raw.chars().filter(|c| !c.is_whitespace()).flat_map(char::to_lowercase).collect();
    if out.is_empty() { None } else { Some(out) }
}

/// Candidate username, else display name, else first email's local part,
/// else provider name plus external id.
pub fn base_username(assertion: &DelegatedProfileAssertion) -> String {
    let email_local = assertion
        .emails
        .iter()
        .map(|e| e.trim())
        .find(|e| !e.is_empty())
        .map(|e| e.split('@').next().unwrap_or(e));
    [assertion.candidate_username.as_deref(), assertion.display_name.as_deref(), email_local]
        .into_iter()
        .flatten()
        .find_map(normalize_username)
        .or_else(|| normalize_username(&format!("{}{}", assertion.provider.as_str(), assertion.external_id)))
        .unwrap_or_else(|| assertion.provider.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assertion(candidate: Option<&str>, display: Option<&str>, emails: &[&str]) -> DelegatedProfileAssertion {
        DelegatedProfileAssertion {
            provider: Provider::GitHub,
            external_id: "583231".into(),
            candidate_username: candidate.map(str::to_string),
            display_name: display.map(str::to_string),
            emails: emails.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn base_username_fallback_order() {
        assert_eq!(base_username(&assertion(Some("Octo Cat"), Some("The Octocat"), &["o@x.com"])), "octocat");
        assert_eq!(base_username(&assertion(Some("   "), Some("Mona Lisa"), &[])), "monalisa");
        assert_eq!(base_username(&assertion(None, None, &["Mona.L@x.com"])), "mona.l");
        assert_eq!(base_username(&assertion(None, None, &[])), "github583231");
        let mut spaced = assertion(None, None, &[]);
        spaced.provider = Provider::Google;
        spaced.external_id = "AbC 9".into();
        assert_eq!(base_username(&spaced), "googleabc9");
    }

    #[test]
    fn suffix_positions() {
        assert_eq!(username_at("alice", 0), "alice");
        assert_eq!(username_at("alice", 1), "alice0");
        assert_eq!(username_at("alice", 2), "alice1");
    }

    #[test]
    fn normalize_strips_all_whitespace() {
        assert_eq!(normalize_username(" A b\tC "), Some("abc".into()));
        assert_eq!(normalize_username(" \n"), None);
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;

use super::{IdentityStore, StoreError, UniqueField, Upsert};
use crate::identity::{Identity, IdentityId, NewIdentity, Provider};

#[derive(Default)]
struct Tables {
    rows: HashMap<IdentityId, Identity>,
    by_username: HashMap<String, IdentityId>,
    /// Lowercased email -> ids in insertion order.
    by_email: HashMap<String, Vec<IdentityId>>,
    by_link: HashMap<(Provider, String), IdentityId>,
}

impl Tables {
    fn check_unique(&self, new: &NewIdentity) -> Result<(), StoreError> {
        if self.by_username.contains_key(&new.username) {
            return Err(StoreError::UniqueViolation(UniqueField::Username));
        }
        for (provider, ext) in new.provider_links.iter() {
            if self.by_link.contains_key(&(*provider, ext.clone())) {
                return Err(StoreError::UniqueViolation(UniqueField::ProviderLink(*provider)));
            }
        }
        Ok(())
    }

    fn insert_unchecked(&mut self, new: NewIdentity) -> Identity {
        let identity = Identity {
            id: IdentityId::generate(),
            username: new.username,
            email: new.email,
            display_name: new.display_name,
            password: new.password,
            provider_links: new.provider_links,
            created_at: Utc::now(),
        };
        self.by_username.insert(identity.username.clone(), identity.id);
        if let Some(email) = identity.email.as_deref() {
            self.by_email.entry(email_key(email)).or_default().push(identity.id);
        }
        for (provider, ext) in identity.provider_links.iter() {
            self.by_link.insert((*provider, ext.clone()), identity.id);
        }
        self.rows.insert(identity.id, identity.clone());
        identity
    }

    fn linked(&self, provider: Provider, external_id: &str) -> Option<&Identity> {
        self.by_link
            .get(&(provider, external_id.to_string()))
            .and_then(|id| self.rows.get(id))
    }
}

fn email_key(email: &str) -> String { email.trim().to_lowercase() }

/// In-process identity store. All uniqueness checks and the paired writes
/// happen under one write lock, so each operation is atomic.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.tables.read().rows.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Snapshot of all identities, oldest first.
    pub fn all(&self) -> Vec<Identity> {
        let mut out: Vec<Identity> = self.tables.read().rows.values().cloned().collect();
        out.sort_by_key(|i| i.created_at);
        out
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables.read().rows.get(id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError> {
        let t = self.tables.read();
        Ok(t.by_username.get(username).and_then(|id| t.rows.get(id)).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let t = self.tables.read();
        Ok(t.by_email
            .get(&email_key(email))
            .and_then(|ids| ids.first())
            .and_then(|id| t.rows.get(id))
            .cloned())
    }

    async fn find_by_provider_link(&self, provider: Provider, external_id: &str) -> Result<Option<Identity>, StoreError> {
        Ok(self.tables.read().linked(provider, external_id).cloned())
    }

    async fn insert(&self, new: NewIdentity) -> Result<Identity, StoreError> {
        let mut t = self.tables.write();
        t.check_unique(&new)?;
        Ok(t.insert_unchecked(new))
    }

    async fn insert_unless_linked(&self, provider: Provider, external_id: &str, new: NewIdentity) -> Result<Upsert, StoreError> {
        if new.provider_links.get(&provider).map(String::as_str) != Some(external_id) {
            return Err(StoreError::Other(format!("new identity does not carry the {} link it is keyed on", provider)));
        }
        let mut t = self.tables.write();
        if let Some(existing) = t.linked(provider, external_id) {
            return Ok(Upsert::Existing(existing.clone()));
        }
        t.check_unique(&new)?;
        Ok(Upsert::Inserted(t.insert_unchecked(new)))
    }

    async fn link_provider(&self, id: &IdentityId, provider: Provider, external_id: &str) -> Result<Identity, StoreError> {
        let mut t = self.tables.write();
        let key = (provider, external_id.to_string());
        if let Some(holder) = t.by_link.get(&key) {
            if holder != id {
                return Err(StoreError::UniqueViolation(UniqueField::ProviderLink(provider)));
            }
        }
        let row = t.rows.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        match row.provider_links.get(&provider) {
            Some(current) if current == external_id => return Ok(row.clone()),
            Some(_) => return Err(StoreError::LinkExists(provider)),
            None => {}
        }
        row.provider_links.insert(provider, external_id.to_string());
        let updated = row.clone();
        t.by_link.insert(key, *id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ProviderLinks;

    fn new_identity(username: &str, email: Option<&str>) -> NewIdentity {
        NewIdentity {
            username: username.into(),
            email: email.map(str::to_string),
            display_name: username.into(),
            password: None,
            provider_links: ProviderLinks::new(),
        }
    }

    #[tokio::test]
    async fn username_uniqueness_is_enforced() {
        let store = MemoryIdentityStore::new();
        store.insert(new_identity("alice", None)).await.unwrap();
        let err = store.insert(new_identity("alice", None)).await.unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation(UniqueField::Username));
        // usernames are case-sensitive tokens
        assert!(store.insert(new_identity("Alice", None)).await.is_ok());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn email_lookup_ignores_case_and_prefers_oldest() {
        let store = MemoryIdentityStore::new();
        let first = store.insert(new_identity("bob", Some("bob@x.com"))).await.unwrap();
        store.insert(new_identity("bob2", Some("BOB@x.com"))).await.unwrap();
        let found = store.find_by_email("Bob@X.com").await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn link_provider_never_replaces_an_existing_link() {
        let store = MemoryIdentityStore::new();
        let a = store.insert(new_identity("a", None)).await.unwrap();
        store.link_provider(&a.id, Provider::GitHub, "1").await.unwrap();
        // idempotent
        let again = store.link_provider(&a.id, Provider::GitHub, "1").await.unwrap();
        assert_eq!(again.link_for(Provider::GitHub), Some("1"));
        let err = store.link_provider(&a.id, Provider::GitHub, "2").await.unwrap_err();
        assert_eq!(err, StoreError::LinkExists(Provider::GitHub));

        let b = store.insert(new_identity("b", None)).await.unwrap();
        let err = store.link_provider(&b.id, Provider::GitHub, "1").await.unwrap_err();
        assert_eq!(err, StoreError::UniqueViolation(UniqueField::ProviderLink(Provider::GitHub)));
    }

    #[tokio::test]
    async fn insert_unless_linked_returns_the_existing_holder() {
        let store = MemoryIdentityStore::new();
        let mut new = new_identity("octo", None);
        new.provider_links.insert(Provider::GitHub, "42".into());
        let first = store.insert_unless_linked(Provider::GitHub, "42", new.clone()).await.unwrap();
        assert!(matches!(first, Upsert::Inserted(_)));
        new.username = "octo0".into();
        let second = store.insert_unless_linked(Provider::GitHub, "42", new).await.unwrap();
        assert_eq!(second, Upsert::Existing(first.into_identity()));
        assert_eq!(store.len(), 1);
    }
}

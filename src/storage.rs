//! Identity store contract.
//!
//! The store is the single point of shared mutable state for identities. It
//! enforces uniqueness on `username` and on every `(provider, external_id)`
//! link, and offers an atomic insert-if-absent keyed on a provider link so
//! concurrent first logins cannot create two accounts for one external subject.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::identity::{Identity, IdentityId, NewIdentity, Provider};

pub mod memory;

pub use memory::MemoryIdentityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    ProviderLink(Provider),
}

impl Display for UniqueField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UniqueField::Username => f.write_str("username"),
            UniqueField::ProviderLink(p) => write!(f, "{}Id", p.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Transient; the caller may retry.
    #[error("identity store unavailable: {0}")]
    Unavailable(String),
    #[error("unique constraint violated on {0}")]
    UniqueViolation(UniqueField),
    /// The identity already carries a different external id for this provider.
    #[error("identity already linked to another {0} account")]
    LinkExists(Provider),
    #[error("identity {0} not found")]
    NotFound(IdentityId),
    #[error("identity store failure: {0}")]
    Other(String),
}

/// Outcome of [`IdentityStore::insert_unless_linked`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    Inserted(Identity),
    Existing(Identity),
}

impl Upsert {
    pub fn into_identity(self) -> Identity {
        match self {
            Upsert::Inserted(i) | Upsert::Existing(i) => i,
        }
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: &IdentityId) -> Result<Option<Identity>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, StoreError>;

    /// Case-insensitive match; the oldest identity wins when several share an email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    async fn find_by_provider_link(&self, provider: Provider, external_id: &str) -> Result<Option<Identity>, StoreError>;

    /// Rejects with `UniqueViolation` on a taken username or an already-held provider link.
    async fn insert(&self, new: NewIdentity) -> Result<Identity, StoreError>;

    /// Atomically returns the identity holding `(provider, external_id)` if one
    /// exists, else inserts `new` (which must carry that link).
    async fn insert_unless_linked(&self, provider: Provider, external_id: &str, new: NewIdentity) -> Result<Upsert, StoreError>;

    /// Adds a provider link to an existing identity. Re-linking the same
    /// external id is a no-op; links are never replaced or removed.
    async fn link_provider(&self, id: &IdentityId, provider: Provider, external_id: &str) -> Result<Identity, StoreError>;
}

pub type SharedIdentityStore = Arc<dyn IdentityStore>;

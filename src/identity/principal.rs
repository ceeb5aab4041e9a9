use serde::{Deserialize, Serialize};

use super::error::SessionError;
use super::model::{Identity, IdentityId};
use crate::storage::SharedIdentityStore;

/// What a session stores about its principal: the identity id and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReference {
    pub identity_id: IdentityId,
}

/// Converts identities to session references and back.
#[derive(Clone)]
pub struct PrincipalSerializer {
    store: SharedIdentityStore,
}

impl PrincipalSerializer {
    pub fn new(store: SharedIdentityStore) -> Self { Self { store } }

    pub fn to_reference(identity: &Identity) -> SessionReference {
        SessionReference { identity_id: identity.id }
    }

    pub async fn from_reference(&self, reference: &SessionReference) -> Result<Identity, SessionError> {
        self.store
            .find_by_id(&reference.identity_id)
            .await?
            .ok_or(SessionError::UnknownIdentity(reference.identity_id))
    }
}

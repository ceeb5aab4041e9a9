use std::sync::Arc;

use tracing::debug;

use super::error::{SessionError, Unauthorized};
use super::model::Identity;
use super::principal::PrincipalSerializer;
use super::session::{Session, SessionStore};
use crate::storage::{SharedIdentityStore, StoreError};

/// Authentication state of a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestAuth {
    Unauthenticated,
    Authenticated(Identity),
}

impl RequestAuth {
    pub fn is_authenticated(&self) -> bool { matches!(self, RequestAuth::Authenticated(_)) }

    pub fn require_authenticated(&self) -> Result<&Identity, Unauthorized> {
        match self {
            RequestAuth::Authenticated(identity) => Ok(identity),
            RequestAuth::Unauthenticated => Err(Unauthorized),
        }
    }

    pub fn into_authenticated(self) -> Result<Identity, Unauthorized> {
        match self {
            RequestAuth::Authenticated(identity) => Ok(identity),
            RequestAuth::Unauthenticated => Err(Unauthorized),
        }
    }
}

/// Classifies requests by their session token. Only classifies; callers
/// decide how to respond to an unauthenticated request.
pub struct AuthGate {
    principals: PrincipalSerializer,
    sessions: Arc<SessionStore>,
}

impl AuthGate {
    pub fn new(store: SharedIdentityStore, sessions: Arc<SessionStore>) -> Self {
        Self { principals: PrincipalSerializer::new(store), sessions }
    }

    pub fn sessions(&self) -> &SessionStore { &self.sessions }

    /// A missing, expired or stale token yields `Unauthenticated`; store faults propagate.
    pub async fn evaluate(&self, token: Option<&str>) -> Result<RequestAuth, StoreError> {
        let Some(token) = token else { return Ok(RequestAuth::Unauthenticated); };
        let Some(reference) = self.sessions.load(token) else { return Ok(RequestAuth::Unauthenticated); };
        match self.principals.from_reference(&reference).await {
            Ok(identity) => Ok(RequestAuth::Authenticated(identity)),
            Err(SessionError::UnknownIdentity(id)) => {
                let dropped = self.sessions.revoke_identity(&id);
                debug!(target: "spendwise::gate", "dropped {} session(s) for deleted identity={}", dropped, id);
                Ok(RequestAuth::Unauthenticated)
            }
            Err(SessionError::Store(e)) => Err(e),
        }
    }

    pub fn login(&self, identity: &Identity) -> Session {
        self.sessions.issue(PrincipalSerializer::to_reference(identity))
    }

    pub fn logout(&self, token: &str) -> bool { self.sessions.destroy(token) }
}

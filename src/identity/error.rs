use thiserror::Error;

use super::model::{IdentityId, Provider};
use crate::storage::StoreError;

/// Why a delegated provider was left disabled at startup. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{provider} OAuth credentials not found ({missing} missing); {provider} strategy not registered")]
    MissingCredentials { provider: Provider, missing: &'static str },
    #[error("{provider} client not compiled into this build; {provider} OAuth will be disabled")]
    ClientUnavailable { provider: Provider },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("{} OAuth is not configured on this server.", .0.label())]
    ProviderNotConfigured(Provider),
    #[error("unknown authentication strategy '{0}'")]
    UnknownStrategy(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// Deliberately carries no detail about which part was wrong.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("username '{0}' is already taken")]
    UsernameTaken(String),
    #[error("invalid registration: {0}")]
    InvalidInput(&'static str),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Store(StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("identity {identity} is already linked to a different {provider} account")]
    LinkConflict { identity: IdentityId, provider: Provider },
    #[error("identity store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("no free username derived from '{0}'")]
    UsernameSpaceExhausted(String),
    #[error("invalid profile assertion: {0}")]
    InvalidAssertion(&'static str),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ResolutionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ResolutionError::StoreUnavailable(msg),
            other => ResolutionError::Store(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The referenced identity no longer exists; treat as unauthenticated.
    #[error("session references unknown identity {0}")]
    UnknownIdentity(IdentityId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not authenticated")]
pub struct Unauthorized;

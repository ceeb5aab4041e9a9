use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use once_cell::sync::Lazy;
use password_hash::{PasswordHash, SaltString};
use tracing::{debug, info};

use super::error::{RegistrationError, VerificationError};
use super::model::{Identity, NewIdentity, PasswordCredential, ProviderLinks};
use crate::storage::{SharedIdentityStore, StoreError, UniqueField};

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let phc = Argon2::default().hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(phc: &str, password: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

// Verified against when the user or credential is missing, so every failure path does the same work.
static DUMMY_PHC: Lazy<Option<String>> = Lazy::new(|| hash_password("spendwise-unused-credential").ok());

async fn verify_blocking(phc: Option<String>, password: &str) -> bool {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || match phc {
        Some(phc) => verify_password(&phc, &password),
        None => {
            if let Some(dummy) = DUMMY_PHC.as_deref() {
                let _ = verify_password(dummy, &password);
            }
            false
        }
    })
    .await
    .unwrap_or(false)
}

/// Local username/password authentication and registration.
#[derive(Clone)]
pub struct CredentialVerifier {
    store: SharedIdentityStore,
}

impl CredentialVerifier {
    pub fn new(store: SharedIdentityStore) -> Self { Self { store } }

    pub async fn verify(&self, username: &str, password: &str) -> Result<Identity, VerificationError> {
        let found = self.store.find_by_username(username.trim()).await?;
        let phc = found.as_ref().and_then(|i| i.password.as_ref()).map(|c| c.phc().to_string());
        if verify_blocking(phc, password).await {
            // verify_blocking only succeeds with a stored credential
            if let Some(identity) = found {
                debug!(target: "spendwise::credentials", "verified user={}", identity.username);
                return Ok(identity);
            }
        }
        debug!(target: "spendwise::credentials", "credential verification failed");
        Err(VerificationError::InvalidCredentials)
    }

    pub async fn register(
        &self,
        username: &str,
        email: Option<&str>,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<Identity, RegistrationError> {
        let username = username.trim();
        if username.is_empty() { return Err(RegistrationError::InvalidInput("username is required")); }
        if password.is_empty() { return Err(RegistrationError::InvalidInput("password is required")); }

        let pw = password.to_string();
        let phc = tokio::task::spawn_blocking(move || hash_password(&pw))
            .await
            .map_err(|e| RegistrationError::Hash(e.to_string()))?
            .map_err(|e| RegistrationError::Hash(e.to_string()))?;

        let email = email.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string);
        let display_name = display_name
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(username)
            .to_string();
        let new = NewIdentity {
            username: username.to_string(),
            email,
            display_name,
            password: Some(PasswordCredential::from_phc(phc)),
            provider_links: ProviderLinks::new(),
        };
        match self.store.insert(new).await {
            Ok(identity) => {
                info!(target: "spendwise::credentials", "registered user={} id={}", identity.username, identity.id);
                Ok(identity)
            }
            Err(StoreError::UniqueViolation(UniqueField::Username)) => Err(RegistrationError::UsernameTaken(username.to_string())),
            Err(e) => Err(RegistrationError::Store(e)),
        }
    }
}

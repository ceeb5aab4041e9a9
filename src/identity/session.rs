use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tracing::debug;

use super::model::IdentityId;
use super::principal::SessionReference;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub reference: SessionReference,
    pub expires_at: Instant,
}

/// 256-bit random token, base64url without padding.
pub(crate) fn gen_token() -> String {
    let mut buf = [0u8; 32];
    if getrandom::getrandom(&mut buf).is_err() {
        // uuid panics if the OS RNG is really gone, never a zeroed token
        buf[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        buf[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// Opaque session transport: token -> [`SessionReference`], with TTL expiry.
/// Expired entries are dropped lazily when looked up.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    by_identity: RwLock<HashMap<IdentityId, HashSet<SessionToken>>>,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(60 * 60)) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), by_identity: RwLock::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration { self.ttl }

    pub fn issue(&self, reference: SessionReference) -> Session {
        let now = Instant::now();
        let session = Session { token: gen_token(), reference, expires_at: now + self.ttl };
        let mut sessions = self.sessions.write();
        let mut idx = self.by_identity.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        if sessions.len() != before {
            idx.retain(|_, tokens| {
                tokens.retain(|t| sessions.contains_key(t));
                !tokens.is_empty()
            });
        }
        sessions.insert(session.token.clone(), session.clone());
        idx.entry(reference.identity_id).or_default().insert(session.token.clone());
        debug!(target: "spendwise::session", "session.issue identity={} ttl_secs={}", reference.identity_id, self.ttl.as_secs());
        session
    }

    pub fn load(&self, token: &str) -> Option<SessionReference> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.reference),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.destroy(token);
        }
        None
    }

    pub fn destroy(&self, token: &str) -> bool {
        let Some(session) = self.sessions.write().remove(token) else { return false; };
        let mut idx = self.by_identity.write();
        if let Some(set) = idx.get_mut(&session.reference.identity_id) {
            set.remove(token);
            if set.is_empty() { idx.remove(&session.reference.identity_id); }
        }
        true
    }

    /// Drop every session pointing at `identity_id`.
    pub fn revoke_identity(&self, identity_id: &IdentityId) -> usize {
        let Some(tokens) = self.by_identity.write().remove(identity_id) else { return 0; };
        let mut sessions = self.sessions.write();
        let count = tokens.iter().filter(|t| sessions.remove(t.as_str()).is_some()).count();
        debug!(target: "spendwise::session", "session.revoke identity={} count={}", identity_id, count);
        count
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

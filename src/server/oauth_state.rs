use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::identity::{gen_token, Provider};

const STATE_MAX_AGE: Duration = Duration::from_secs(600);

/// Single-use `state` tokens for in-flight OAuth handshakes.
#[derive(Default)]
pub struct PendingStates {
    states: Mutex<HashMap<String, (Provider, Instant)>>,
}

impl PendingStates {
    pub fn issue(&self, provider: Provider) -> String {
        let token = gen_token();
        let mut states = self.states.lock();
        states.retain(|_, (_, at)| at.elapsed() < STATE_MAX_AGE);
        states.insert(token.clone(), (provider, Instant::now()));
        token
    }

    /// Consumes the token; true only if it was issued for `provider` and is still fresh.
    pub fn take(&self, token: &str, provider: Provider) -> bool {
        match self.states.lock().remove(token) {
            Some((p, at)) => p == provider && at.elapsed() < STATE_MAX_AGE,
            None => false,
        }
    }
}

//! Anonymous login (§3 addition): a session token maps to a
//! [`PlayerIdentity`], grounded in `auth.py`'s `anonymous_login_handler`
//! but simplified — no password or credential check, matching spec.md
//! §1's "Anonymous-login cookie scheme" scoping.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::Rng;

use crate::types::PlayerIdentity;

#[derive(Default)]
pub struct SessionStore {
    tokens: Mutex<HashMap<String, PlayerIdentity>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token for `name`. Each login gets its own identity
    /// (its own `id`), so the same display name can be used by more than
    /// one concurrent anonymous session, exactly as the original allows.
    pub fn login(&self, name: String) -> (String, PlayerIdentity) {
        let token = generate_token();
        let identity = PlayerIdentity {
            id: generate_token(),
            name,
        };
        self.tokens.lock().insert(token.clone(), identity.clone());
        (token, identity)
    }

    pub fn resolve(&self, token: &str) -> Option<PlayerIdentity> {
        self.tokens.lock().get(token).cloned()
    }
}

fn generate_token() -> String {
    let mut rng = rand::rng();
    (0..32).map(|_| rng.random_range(b'a'..=b'z') as char).collect()
}

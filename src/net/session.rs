use hashbrown::HashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::game::state::PlayerId;

/// Opaque bearer token bound to a verified identity.
/// Uses CSPRNG for cryptographic security
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken([u8; 32]);

impl SessionToken {
    /// Generate a new cryptographically secure session token
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to Vec<u8> for network transmission
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Try to create from a slice
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 32] = slice.try_into().ok()?;
        Some(Self(bytes))
    }
}

/// Token → identity map.
///
/// One live token per identity: issuing again revokes the previous token.
/// Tokens outlive connections so a client can reconnect with the same one.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    by_token: HashMap<SessionToken, PlayerId>,
    by_player: HashMap<PlayerId, SessionToken>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `player_id`
    pub fn issue(&mut self, player_id: &str) -> SessionToken {
        self.revoke(player_id);
        let token = SessionToken::generate();
        self.by_token.insert(token.clone(), player_id.to_string());
        self.by_player.insert(player_id.to_string(), token.clone());
        token
    }

    /// Identity bound to `token`
    pub fn resolve(&self, token: &SessionToken) -> Option<&PlayerId> {
        self.by_token.get(token)
    }

    pub fn revoke(&mut self, player_id: &str) -> bool {
        match self.by_player.remove(player_id) {
            Some(token) => {
                self.by_token.remove(&token);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

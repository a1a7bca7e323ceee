//! Durable storage behind the world hub.
//!
//! The hub only sees the traits here; the concrete stores are chosen in
//! `main` (JSON files) or in tests (memory).

pub mod admins;
pub mod json_store;
pub mod memory;

use std::io;

use crate::game::state::Player;

pub use admins::AdminList;
pub use json_store::JsonFileStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("account '{0}' already exists")]
    AlreadyExists(String),
    #[error("invalid identity '{0}'")]
    InvalidIdentity(String),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Persistent player records, keyed by identity
pub trait PlayerStore: Send + Sync {
    /// `Ok(None)` when the identity has never been registered
    fn load(&self, id: &str) -> Result<Option<Player>, StoreError>;

    /// Overwrite the stored record
    fn save(&self, player: &Player) -> Result<(), StoreError>;

    /// Store a new record; fails if the identity already exists
    fn create(&self, player: &Player) -> Result<(), StoreError>;

    /// Delete every record
    fn reset(&self) -> Result<(), StoreError>;
}

/// Durable allow-list of admin identities consulted at registration
pub trait AdminRegistry: Send + Sync {
    fn is_admin(&self, id: &str) -> bool;

    /// Add `id`; returns false if it was already listed
    fn add(&self, id: &str) -> Result<bool, StoreError>;
}

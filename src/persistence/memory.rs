use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{PlayerStore, StoreError};
use crate::game::state::{Player, PlayerId};

/// Volatile player store for tests and benchmarks
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<PlayerId, Player>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl PlayerStore for MemoryStore {
    fn load(&self, id: &str) -> Result<Option<Player>, StoreError> {
        Ok(self.records.lock().get(id).cloned())
    }

    fn save(&self, player: &Player) -> Result<(), StoreError> {
        self.records.lock().insert(player.id.clone(), player.clone());
        Ok(())
    }

    fn create(&self, player: &Player) -> Result<(), StoreError> {
        let mut records = self.records.lock();
        if records.contains_key(&player.id) {
            return Err(StoreError::AlreadyExists(player.id.clone()));
        }
        records.insert(player.id.clone(), player.clone());
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        self.records.lock().clear();
        Ok(())
    }
}

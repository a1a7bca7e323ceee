use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{PlayerStore, StoreError};
use crate::game::state::Player;

const EXTENSION: &str = "json";

/// One pretty-printed JSON document per identity under a data directory.
///
/// Writes go to a temp file first and are renamed into place, so a crash
/// mid-save leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) the store directory and check it is writable
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let probe = dir.join(".write-probe");
        fs::write(&probe, b"ok")?;
        fs::remove_file(&probe)?;
        info!("Player store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File for `id`. Identities are restricted to a safe character set so
    /// they can never escape the store directory.
    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id.len() <= 64
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidIdentity(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }

    fn write_atomic(&self, path: &Path, player: &Player) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(player)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl PlayerStore for JsonFileStore {
    fn load(&self, id: &str) -> Result<Option<Player>, StoreError> {
        let path = self.path_for(id)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut player: Player = serde_json::from_slice(&data)?;
        player.id = id.to_string();
        Ok(Some(player))
    }

    fn save(&self, player: &Player) -> Result<(), StoreError> {
        let path = self.path_for(&player.id)?;
        self.write_atomic(&path, player)?;
        debug!("Saved {}", player.id);
        Ok(())
    }

    fn create(&self, player: &Player) -> Result<(), StoreError> {
        let path = self.path_for(&player.id)?;
        if path.exists() {
            return Err(StoreError::AlreadyExists(player.id.clone()));
        }
        self.write_atomic(&path, player)
    }

    fn reset(&self) -> Result<(), StoreError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        info!("Player store reset, {} records removed", removed);
        Ok(())
    }
}

use std::fs;
use std::io;
use std::path::PathBuf;

use hashbrown::HashSet;
use parking_lot::Mutex;
use tracing::info;

use super::{AdminRegistry, StoreError};
use crate::game::state::PlayerId;

/// Admin identities, optionally backed by a JSON array file.
///
/// Membership is kept in memory; every successful `add` rewrites the file.
#[derive(Debug)]
pub struct AdminList {
    path: Option<PathBuf>,
    ids: Mutex<HashSet<PlayerId>>,
}

impl AdminList {
    /// Load from `path`; a missing file is an empty list
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let ids: Vec<PlayerId> = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!("Loaded {} admin(s) from {}", ids.len(), path.display());
        Ok(Self {
            path: Some(path),
            ids: Mutex::new(ids.into_iter().collect()),
        })
    }

    /// List that is never written to disk
    pub fn in_memory<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PlayerId>,
    {
        Self {
            path: None,
            ids: Mutex::new(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }

    fn write(&self, ids: &HashSet<PlayerId>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut sorted: Vec<&PlayerId> = ids.iter().collect();
        sorted.sort();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&sorted)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl AdminRegistry for AdminList {
    fn is_admin(&self, id: &str) -> bool {
        self.ids.lock().contains(id)
    }

    fn add(&self, id: &str) -> Result<bool, StoreError> {
        let mut ids = self.ids.lock();
        if !ids.insert(id.to_string()) {
            return Ok(false);
        }
        if let Err(e) = self.write(&ids) {
            ids.remove(id);
            return Err(e);
        }
        Ok(true)
    }
}

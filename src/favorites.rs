use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::tmdb::MediaItem;

/// File-backed favorites list. Loaded once at startup, kept in memory for
/// the process lifetime; every mutation rewrites the file in full. A missing
/// or unparseable file loads as an empty list, never as an error.
pub struct FavoritesStore {
    path: PathBuf,
    entries: Mutex<Vec<MediaItem>>,
}

impl FavoritesStore {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Vec<MediaItem>>(&raw) {
                Ok(list) => {
                    info!("Loaded {} favorites from {}", list.len(), path.display());
                    list
                }
                Err(e) => {
                    warn!(
                        "Discarding corrupt favorites file {}: {}",
                        path.display(),
                        e
                    );
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    pub fn list(&self) -> Vec<MediaItem> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|m| m.id)
            .collect()
    }

    pub fn is_favorite(&self, id: i64) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|m| m.id == id)
    }

    /// Adds the item when absent, removes it when present. Returns whether
    /// the item is a favorite after the call.
    pub fn toggle(&self, item: MediaItem) -> Result<bool> {
        let snapshot;
        let now_favorite;
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(pos) = entries.iter().position(|m| m.id == item.id) {
                entries.remove(pos);
                now_favorite = false;
            } else {
                entries.push(item);
                now_favorite = true;
            }
            snapshot = entries.clone();
        }
        self.persist(&snapshot)?;
        Ok(now_favorite)
    }

    pub fn clear(&self) -> Result<()> {
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.clear();
        }
        self.persist(&[])
    }

    fn persist(&self, entries: &[MediaItem]) -> Result<()> {
        let raw = serde_json::to_string(entries).context("serializing favorites failed")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing favorites to {}", self.path.display()))
    }
}

use sled::Db;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Disk-based cache using sled
#[derive(Clone)]
pub struct DiskCache {
    db: Db,
}

impl DiskCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheInit(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            // Detect lock errors and provide actionable fix
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::CacheInit(format!(
                    "Cache locked at {}\n\n\
                    Another process is using the cache, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::CacheInit(format!("Failed to open cache at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened disk cache at {}", path.display());

        Ok(Self { db })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match self.db.get(key.as_bytes()) {
            Ok(Some(value)) => match String::from_utf8(value.to_vec()) {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!("Discarding non-UTF-8 cache entry {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Cache read error: {}", e);
                None
            }
        }
    }

    pub fn insert(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value.as_bytes())
            .map_err(|e| Error::CacheWrite(e.to_string()))?;
        Ok(())
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::CacheWrite(format!("Flush failed: {e}")))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.db.clear().map_err(|e| Error::CacheWrite(e.to_string()))?;
        self.flush()
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}

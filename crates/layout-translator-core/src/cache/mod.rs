mod disk;
mod key;
mod memory;

pub use disk::DiskCache;
pub use key::CacheKey;
pub use memory::MemoryCache;

use tracing::{debug, warn};

use crate::config::{CacheConfig, Lang};
use crate::error::Result;

/// Memo table of chunk translations, keyed by exact text and target language.
///
/// Two layers: a bounded in-memory cache and an optional sled store on disk.
/// Clones share the same underlying storage, so one cache can be handed to
/// every job in the process.
#[derive(Clone)]
pub struct TranslationCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TranslationCache {
    /// Create a new translation cache from configuration
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let memory = config
            .memory_enabled
            .then(|| MemoryCache::new(config.memory_max_mb, config.memory_ttl_seconds));

        let disk = if config.disk_enabled {
            let path = config
                .disk_path
                .clone()
                .unwrap_or_else(crate::util::translation_cache_path);
            Some(DiskCache::new(path)?)
        } else {
            None
        };

        Ok(Self { memory, disk })
    }

    /// A cache that never stores anything.
    pub const fn disabled() -> Self {
        Self {
            memory: None,
            disk: None,
        }
    }

    /// Get a cached translation
    pub async fn get(&self, text: &str, lang: &Lang) -> Option<String> {
        let key = CacheKey::new(text, lang).to_string();

        if let Some(ref memory) = self.memory
            && let Some(value) = memory.get(&key).await
        {
            return Some(value);
        }

        if let Some(ref disk) = self.disk
            && let Some(value) = disk.get(&key)
        {
            debug!("Disk cache hit for {}", key);
            // Promote to memory so the next lookup stays off disk
            if let Some(ref memory) = self.memory {
                memory.insert(key, value.clone()).await;
            }
            return Some(value);
        }

        None
    }

    /// Store a translation
    pub async fn put(&self, text: &str, lang: &Lang, translation: &str) {
        let key = CacheKey::new(text, lang).to_string();

        if let Some(ref disk) = self.disk
            && let Err(e) = disk.insert(&key, translation)
        {
            warn!("Failed to persist translation {}: {}", key, e);
        }

        if let Some(ref memory) = self.memory {
            memory.insert(key, translation.to_string()).await;
        }
    }

    /// Write pending disk entries; called once a job's dispatch phase ends.
    pub fn flush(&self) {
        if let Some(ref disk) = self.disk
            && let Err(e) = disk.flush()
        {
            warn!("Failed to flush translation cache: {}", e);
        }
    }

    /// Clear all caches
    pub fn clear(&self) {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }

        if let Some(ref disk) = self.disk
            && let Err(e) = disk.clear()
        {
            warn!("Failed to clear disk cache: {}", e);
        }
    }
}

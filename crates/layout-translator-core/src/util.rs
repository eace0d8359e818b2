//! Utility functions shared across the crate.

use std::path::{Path, PathBuf};

use crate::config::APP_DIR;
use crate::error::{Error, Result};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's cache directory following XDG conventions.
///
/// Returns `$XDG_CACHE_HOME` if set, otherwise `$HOME/.cache`.
pub fn cache_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache")))
}

/// Get the default translation cache path.
pub fn translation_cache_path() -> PathBuf {
    cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR)
}

/// Clear the on-disk translation cache at `path` (or the default location).
///
/// Returns the number of entries cleared.
pub fn clear_translation_cache(path: Option<&Path>) -> Result<usize> {
    let cache_path = path.map_or_else(translation_cache_path, Path::to_path_buf);

    if !cache_path.exists() {
        return Ok(0);
    }

    let db = sled::open(&cache_path)
        .map_err(|e| Error::CacheInit(format!("Failed to open cache: {e}")))?;

    let count = db.len();
    db.clear()
        .map_err(|e| Error::CacheWrite(format!("Failed to clear cache: {e}")))?;
    db.flush()
        .map_err(|e| Error::CacheWrite(format!("Failed to flush cache: {e}")))?;

    Ok(count)
}

/// Shorten text for log lines, respecting char boundaries.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

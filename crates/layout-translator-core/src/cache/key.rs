use crate::config::Lang;

/// Cache key for a translated chunk.
///
/// Keys are opaque MD5 hashes of the exact source text and target language:
/// - Same text + same target language = same key, whichever document or job
///   the text came from
/// - Any change to the text (including whitespace) produces a different key
/// - Keys are fixed-length (32 hex chars) for consistent storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(text: &str, target_lang: &Lang) -> Self {
        // Null byte separator keeps ("a", "bc") and ("ab", "c") apart.
        let combined = format!("{}\0{}", target_lang.as_str(), text);

        Self {
            hash: format!("{:x}", md5::compute(combined.as_bytes())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

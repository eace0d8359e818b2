//! Fan-out of chunks to the translation backend.
//!
//! Chunks go through the cache first; misses are sent to the translator with
//! at most `max_concurrency` requests in flight. A chunk the backend fails on
//! keeps its source text, so a translation job never fails because of the
//! backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::cache::TranslationCache;
use crate::config::{DispatchConfig, Lang};
use crate::text::TextChunker;
use crate::translator::Translator;
use crate::util::truncate_for_log;

/// Where a chunk's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOrigin {
    /// Nothing to translate (blank chunk)
    Passthrough,
    Cache,
    Translator,
    /// The backend failed or returned nothing; the source text is kept
    Fallback,
}

/// Result for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkTranslation {
    pub text: String,
    pub origin: ChunkOrigin,
}

/// Source text to translation, first result in input order wins.
pub type TranslationMap = HashMap<String, String>;

/// Integer percentage of `done` out of `total`, rounded down.
pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(done.min(total) * 100 / total).unwrap_or(100)
}

/// Split `text` around its leading and trailing whitespace.
fn split_padding(text: &str) -> (&str, &str, &str) {
    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len();
    if start >= end {
        return (text, "", "");
    }
    (&text[..start], &text[start..end], &text[end..])
}

/// Dispatches chunks to a [`Translator`] through a [`TranslationCache`].
#[derive(Clone)]
pub struct TranslationDispatcher {
    translator: Arc<dyn Translator>,
    cache: TranslationCache,
    chunker: TextChunker,
    max_concurrency: usize,
}

impl TranslationDispatcher {
    pub fn new(
        translator: Arc<dyn Translator>,
        cache: TranslationCache,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            translator,
            cache,
            chunker: TextChunker::new(config.chunk_size),
            max_concurrency: config.max_concurrency.max(1),
        }
    }

    pub const fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn translator_name(&self) -> &'static str {
        self.translator.name()
    }

    /// Translate one chunk: cache, then backend, then source text.
    pub async fn translate_chunk(&self, chunk: &str, target: &Lang) -> ChunkTranslation {
        if chunk.trim().is_empty() {
            return ChunkTranslation {
                text: chunk.to_string(),
                origin: ChunkOrigin::Passthrough,
            };
        }

        if let Some(hit) = self.cache.get(chunk, target).await {
            debug!("Cache hit for chunk '{}'", truncate_for_log(chunk, 40));
            return ChunkTranslation {
                text: hit,
                origin: ChunkOrigin::Cache,
            };
        }

        let (leading, core, trailing) = split_padding(chunk);
        match self.translator.translate(core, &Lang::auto(), target).await {
            Ok(translated) if !translated.trim().is_empty() => {
                let text = format!("{leading}{}{trailing}", translated.trim());
                self.cache.put(chunk, target, &text).await;
                ChunkTranslation {
                    text,
                    origin: ChunkOrigin::Translator,
                }
            }
            Ok(_) => {
                warn!(
                    "Empty translation for '{}', keeping source text",
                    truncate_for_log(chunk, 40)
                );
                Self::fallback(chunk)
            }
            Err(e) => {
                warn!(
                    "Translation failed for '{}', keeping source text: {}",
                    truncate_for_log(chunk, 40),
                    e
                );
                Self::fallback(chunk)
            }
        }
    }

    fn fallback(chunk: &str) -> ChunkTranslation {
        ChunkTranslation {
            text: chunk.to_string(),
            origin: ChunkOrigin::Fallback,
        }
    }

    /// Translate `chunks` with bounded concurrency.
    ///
    /// `on_progress` receives the completed percentage after every chunk, in
    /// completion order. Results come back in input order.
    pub async fn dispatch<F>(
        &self,
        chunks: &[String],
        target: &Lang,
        on_progress: F,
    ) -> Vec<ChunkTranslation>
    where
        F: Fn(u8) + Send + Sync,
    {
        let total = chunks.len();
        if total == 0 {
            return Vec::new();
        }

        let concurrency = self.max_concurrency.min(total);
        let completed = AtomicUsize::new(0);
        debug!(
            "Dispatching {} chunks to {} ({} in flight)",
            total,
            self.translator.name(),
            concurrency
        );

        let mut results: Vec<(usize, ChunkTranslation)> = stream::iter(chunks.iter().enumerate())
            .map(|(index, chunk)| {
                let completed = &completed;
                let on_progress = &on_progress;
                async move {
                    let translation = self.translate_chunk(chunk, target).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    on_progress(percent_of(done, total));
                    (index, translation)
                }
            })
            .boxed()
            .buffer_unordered(concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);

        let fallbacks = results
            .iter()
            .filter(|(_, t)| t.origin == ChunkOrigin::Fallback)
            .count();
        if fallbacks > 0 {
            info!("{} of {} chunks kept their source text", fallbacks, total);
        }

        results.into_iter().map(|(_, translation)| translation).collect()
    }

    /// Translate whole text runs. Each run is chunked, all chunks are
    /// dispatched together, and translations are keyed by the run's text.
    pub async fn translate_runs<F>(
        &self,
        runs: &[&str],
        target: &Lang,
        on_progress: F,
    ) -> TranslationMap
    where
        F: Fn(u8) + Send + Sync,
    {
        let mut owners = Vec::new();
        let mut chunks = Vec::new();
        for (run_index, run) in runs.iter().enumerate() {
            for chunk in self.chunker.chunk(run) {
                owners.push(run_index);
                chunks.push(chunk.text);
            }
        }

        let translations = self.dispatch(&chunks, target, on_progress).await;

        let mut joined = vec![String::new(); runs.len()];
        for (owner, translation) in owners.into_iter().zip(translations) {
            joined[owner].push_str(&translation.text);
        }

        let mut map = TranslationMap::with_capacity(runs.len());
        for (run, translation) in runs.iter().zip(joined) {
            if translation.is_empty() {
                continue;
            }
            map.entry((*run).to_string()).or_insert(translation);
        }
        map
    }

    /// Translate a free-standing piece of text.
    pub async fn translate_text(&self, text: &str, target: &Lang) -> String {
        let chunks: Vec<String> = self
            .chunker
            .chunk(text)
            .into_iter()
            .map(|chunk| chunk.text)
            .collect();
        if chunks.is_empty() {
            return text.to_string();
        }

        self.dispatch(&chunks, target, |_| {})
            .await
            .into_iter()
            .map(|translation| translation.text)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::error::{Error, Result};
    use crate::translator::TranslatorInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Prefixes the target language and counts calls; fails on "boom".
    #[derive(Default)]
    struct EchoTranslator {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Translator for EchoTranslator {
        fn info(&self) -> TranslatorInfo {
            TranslatorInfo {
                name: "Echo",
                requires_api_key: false,
                supports_auto_detect: true,
            }
        }

        async fn translate(&self, text: &str, _source: &Lang, target: &Lang) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            match text {
                t if t.contains("boom") => Err(Error::TranslationTimeout),
                t if t.contains("silence") => Ok("   ".to_string()),
                t => Ok(format!("[{target}] {t}")),
            }
        }
    }

    fn dispatcher(translator: Arc<EchoTranslator>, max_concurrency: usize) -> TranslationDispatcher {
        let cache = TranslationCache::new(&CacheConfig::memory_only()).unwrap();
        TranslationDispatcher::new(
            translator,
            cache,
            &DispatchConfig {
                max_concurrency,
                chunk_size: 20,
            },
        )
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(2, 3), 66);
        assert_eq!(percent_of(3, 3), 100);
        assert_eq!(percent_of(0, 0), 100);
    }

    #[test]
    fn test_split_padding() {
        assert_eq!(split_padding("  hi there \n"), ("  ", "hi there", " \n"));
        assert_eq!(split_padding("plain"), ("", "plain", ""));
        assert_eq!(split_padding("   "), ("   ", "", ""));
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(Arc::clone(&translator), 4);
        let chunks: Vec<String> = (0..10).map(|i| format!("chunk {i}")).collect();

        let results = d.dispatch(&chunks, &Lang::new("fr"), |_| {}).await;
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.text, format!("[fr] chunk {i}"));
            assert_eq!(result.origin, ChunkOrigin::Translator);
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(Arc::clone(&translator), 2);
        let ar = Lang::new("ar");

        let first = d.translate_chunk("Hello", &ar).await;
        let second = d.translate_chunk("Hello", &ar).await;

        assert_eq!(first.text, second.text);
        assert_eq!(second.origin, ChunkOrigin::Cache);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_keep_source_text_and_are_not_cached() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(Arc::clone(&translator), 2);
        let de = Lang::new("de");

        let failed = d.translate_chunk("boom goes it", &de).await;
        assert_eq!(failed.text, "boom goes it");
        assert_eq!(failed.origin, ChunkOrigin::Fallback);

        let empty = d.translate_chunk("silence", &de).await;
        assert_eq!(empty.text, "silence");
        assert_eq!(empty.origin, ChunkOrigin::Fallback);

        assert!(d.cache().get("boom goes it", &de).await.is_none());
        d.translate_chunk("boom goes it", &de).await;
        assert_eq!(translator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_whitespace_is_restored_and_blank_chunks_skip_backend() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(Arc::clone(&translator), 2);
        let fr = Lang::new("fr");

        let padded = d.translate_chunk("  Hello.\n", &fr).await;
        assert_eq!(padded.text, "  [fr] Hello.\n");
        assert_eq!(translator.seen.lock().unwrap().as_slice(), ["Hello."]);

        let blank = d.translate_chunk(" \n ", &fr).await;
        assert_eq!(blank.origin, ChunkOrigin::Passthrough);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(translator, 3);
        let chunks: Vec<String> = (0..7).map(|i| format!("c{i}")).collect();
        let seen = Mutex::new(Vec::new());

        d.dispatch(&chunks, &Lang::new("fr"), |p| seen.lock().unwrap().push(p))
            .await;

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 7);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_translate_runs_maps_duplicates_once() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(Arc::clone(&translator), 2);

        let runs = ["Same text.", "Other. Longer sentence here.", "Same text."];
        let map = d.translate_runs(&runs, &Lang::new("es"), |_| {}).await;

        assert_eq!(map.len(), 2);
        assert_eq!(map["Same text."], "[es] Same text.");
        // chunked at 20 chars, each chunk translated separately
        assert_eq!(
            map["Other. Longer sentence here."],
            "[es] Other. [es] Longer sentence here."
        );
    }

    #[tokio::test]
    async fn test_translate_text() {
        let translator = Arc::new(EchoTranslator::default());
        let d = dispatcher(translator, 2);
        assert_eq!(d.translate_text("Hi.", &Lang::new("it")).await, "[it] Hi.");
        assert_eq!(d.translate_text("   ", &Lang::new("it")).await, "   ");
    }
}

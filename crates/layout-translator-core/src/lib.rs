//! Layout Translator Core Library
//!
//! Translates PDF documents while keeping their visual layout:
//! - Element extraction (positioned text runs and images)
//! - Sentence-aware chunking and concurrent dispatch to a translation backend
//! - Caching of chunk translations (memory and disk)
//! - Reassembly of translated text over the original pages, with Arabic
//!   shaping and bidirectional reordering for right-to-left targets
//! - Background jobs with pollable progress

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod job;
pub mod pdf;
pub mod progress;
pub mod text;
pub mod translator;
pub mod util;

pub use cache::{CacheKey, TranslationCache};
pub use config::{
    AppConfig, CacheConfig, DEFAULT_TARGET_LANG, DispatchConfig, JobConfig, Lang, ProviderKind,
    RenderConfig, TextColor, TranslatorConfig,
};
pub use dispatch::{ChunkOrigin, ChunkTranslation, TranslationDispatcher};
pub use error::{Error, Result};
pub use job::TaskOrchestrator;
pub use pdf::{
    BoundingBox, DocumentReassembler, Element, ElementExtractor, ImageElement, OverlayOptions,
    Page, PdfDocument, TextElement,
};
pub use progress::{ProgressSnapshot, ProgressTracker, TaskId, TaskState};
pub use text::{TextChunker, prepare_for_display};
pub use translator::{GoogleTranslator, OpenAiTranslator, Translator, create_translator};
pub use util::clear_translation_cache;

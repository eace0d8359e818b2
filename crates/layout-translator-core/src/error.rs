use thiserror::Error;

/// Unified error type for layout-translator-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - PDF operations (opening, extracting, rendering, saving)
/// - Translation operations (API requests, responses, rate limiting)
/// - Cache operations (initialization, reading, writing)
/// - Task lookups (unknown or unfinished jobs)
/// - Configuration operations (loading, validation)
/// - General I/O operations
///
/// Only some of these are fatal to a translation job. Page-level extraction
/// errors and translation errors are absorbed by the pipeline (empty page,
/// source text kept); open/render/save errors fail the job.
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract content from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to draw translated text into the output document
    #[error("failed to render translation: {0}")]
    Render(String),

    /// Failed to load or embed the overlay font
    #[error("font error: {0}")]
    Font(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Translation Errors
    // ==========================================================================
    /// Translation API request failed
    #[error("translation API request failed: {0}")]
    TranslationRequest(String),

    /// Invalid response from translation API
    #[error("invalid translation API response: {0}")]
    TranslationInvalidResponse(String),

    /// The provider answered but returned no text
    #[error("translation API returned an empty result")]
    TranslationEmpty,

    /// Rate limited by translation API
    #[error("translation rate limited{}", retry_after.map(|s| format!(", retry after {s} seconds")).unwrap_or_default())]
    TranslationRateLimited { retry_after: Option<u64> },

    /// Translation request timed out
    #[error("translation request timed out")]
    TranslationTimeout,

    // ==========================================================================
    // Task Errors
    // ==========================================================================
    /// No task with this id is known (never submitted, failed, or evicted)
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The task exists but has not produced its result yet
    #[error("task {0} is still running")]
    TaskNotReady(String),

    /// A blocking worker panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(String),

    // ==========================================================================
    // Cache Errors
    // ==========================================================================
    /// Failed to initialize the cache
    #[error("failed to initialize cache: {0}")]
    CacheInit(String),

    /// Failed to write to cache
    #[error("failed to write to cache: {0}")]
    CacheWrite(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error comes from the translation provider.
    ///
    /// Provider errors are never fatal to a job: the dispatcher keeps the
    /// source text for the failing chunk.
    pub const fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::TranslationRequest(_)
                | Self::TranslationInvalidResponse(_)
                | Self::TranslationEmpty
                | Self::TranslationRateLimited { .. }
                | Self::TranslationTimeout
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

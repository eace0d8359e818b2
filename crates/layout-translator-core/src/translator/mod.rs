mod google;
mod openai;
mod traits;

pub use google::GoogleTranslator;
pub use openai::OpenAiTranslator;
pub use traits::{Translator, TranslatorInfo};

use crate::config::{ProviderKind, TranslatorConfig};
use crate::error::Result;
use std::sync::Arc;

/// Create a translator from configuration
pub fn create_translator(config: &TranslatorConfig) -> Result<Arc<dyn Translator>> {
    let translator: Arc<dyn Translator> = match config.provider {
        ProviderKind::Google => Arc::new(GoogleTranslator::new(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiTranslator::new(config)?),
    };

    tracing::debug!(
        "Using {} translator at {}",
        translator.name(),
        config.effective_api_base()
    );
    Ok(translator)
}

/// Map a transport failure to the provider error taxonomy.
pub(crate) fn request_error(e: &reqwest::Error) -> crate::error::Error {
    if e.is_timeout() {
        crate::error::Error::TranslationTimeout
    } else {
        crate::error::Error::TranslationRequest(e.to_string())
    }
}

/// Read the `Retry-After` header of a 429 response, in seconds.
pub(crate) fn retry_after(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{Translator, TranslatorInfo};
use super::{request_error, retry_after};
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};

/// Google Translate through the keyless `gtx` web client endpoint.
pub struct GoogleTranslator {
    client: Client,
    pub api_base: String,
}

impl GoogleTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::TranslationRequest(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.effective_api_base().to_string(),
        })
    }

    fn request_url(&self, text: &str, source: &Lang, target: &Lang) -> String {
        let sl = if source.is_auto() { "auto" } else { source.as_str() };
        format!(
            "{}/translate_a/single?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(sl),
            urlencoding::encode(target.as_str()),
            urlencoding::encode(text)
        )
    }
}

/// Concatenate the translated segments of a `gtx` response.
///
/// The body is a nested array; `body[0]` lists one entry per sentence with
/// the translated text at index 0.
fn parse_response(body: &serde_json::Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| {
            Error::TranslationInvalidResponse("missing translation segments".to_string())
        })?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(serde_json::Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(Error::TranslationEmpty);
    }
    Ok(translated)
}

#[async_trait]
impl Translator for GoogleTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "Google Translate",
            requires_api_key: false,
            supports_auto_detect: true,
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        let url = self.request_url(text, source, target);
        debug!("Google translate request ({} chars) to {}", text.chars().count(), target);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| request_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(&response);
            warn!("Rate limited, retry after {:?}s", retry_after);
            return Err(Error::TranslationRateLimited { retry_after });
        }

        if !status.is_success() {
            return Err(Error::TranslationRequest(format!("HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::TranslationInvalidResponse(e.to_string()))?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_joins_segments() {
        let body = json!([
            [
                ["مرحبا. ", "Hello. ", null, null, 10],
                ["كيف حالك؟", "How are you?", null, null, 10]
            ],
            null,
            "en"
        ]);
        assert_eq!(parse_response(&body).unwrap(), "مرحبا. كيف حالك؟");
    }

    #[test]
    fn test_parse_rejects_unexpected_shape() {
        assert!(matches!(
            parse_response(&json!({"error": "nope"})),
            Err(Error::TranslationInvalidResponse(_))
        ));
        assert!(matches!(
            parse_response(&json!([[]])),
            Err(Error::TranslationEmpty)
        ));
    }

    #[test]
    fn test_request_url_encodes_query() {
        let translator = GoogleTranslator::new(&TranslatorConfig::default()).unwrap();
        let url = translator.request_url("a b&c", &Lang::auto(), &Lang::new("ar"));
        assert_eq!(
            url,
            "https://translate.googleapis.com/translate_a/single?client=gtx&sl=auto&tl=ar&dt=t&q=a%20b%26c"
        );
    }
}

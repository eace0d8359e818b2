use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{Translator, TranslatorInfo};
use super::{request_error, retry_after};
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};

/// OpenAI-compatible API translator
/// Works with: llama.cpp server, Ollama, DeepSeek, OpenAI, etc.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiTranslator {
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::TranslationRequest(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.effective_api_base().to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    /// Create translation prompt
    fn create_prompt(text: &str, source: &Lang, target: &Lang) -> String {
        let source_hint = if source.is_auto() {
            String::new()
        } else {
            format!(" from {}", language_name(source))
        };
        format!(
            "Translate the following text{} into {}. Output only the translation, no explanations.\n\nText: \"{}\"",
            source_hint,
            language_name(target),
            text
        )
    }

    async fn request(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: Self::create_prompt(text, source, target),
            }],
            temperature: Some(0.3),
        };

        debug!("Translation request to {}", url);

        let mut req = self.client.post(&url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| request_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = retry_after(&response);
            warn!("Rate limited, retry after {:?}s", retry_after);
            return Err(Error::TranslationRateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TranslationRequest(format!("HTTP {status}: {body}")));
        }

        let chat_response = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| Error::TranslationInvalidResponse(e.to_string()))?;

        let choice = chat_response.choices.first().ok_or_else(|| {
            Error::TranslationInvalidResponse("No choices in response".to_string())
        })?;

        let translated = strip_wrapping_quotes(&choice.message.content);
        if translated.is_empty() {
            return Err(Error::TranslationEmpty);
        }
        Ok(translated.to_string())
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: false, // Optional for local servers
            supports_auto_detect: true,
        }
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        if source.as_str() == target.as_str() && !source.is_auto() {
            return Ok(text.to_string());
        }

        self.request(text, source, target).await
    }
}

/// Models like to echo the quotes from the prompt back.
fn strip_wrapping_quotes(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map_or(trimmed, str::trim)
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &'static str {
    match lang.as_str() {
        "en" => "English",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "fa" => "Persian",
        "ur" => "Urdu",
        "he" => "Hebrew",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        // For unknown languages, the LLM should still understand most ISO codes
        _ => "the specified language",
    }
}

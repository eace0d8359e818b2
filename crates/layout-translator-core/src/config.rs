use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Directory name used under the user's config and cache directories.
pub const APP_DIR: &str = "layout-translator";

/// Prefix for environment overrides, e.g. `LAYOUT_TRANSLATOR__TARGET_LANG=fr`
/// or `LAYOUT_TRANSLATOR__TRANSLATOR__API_KEY=...`.
pub const ENV_PREFIX: &str = "LAYOUT_TRANSLATOR";

/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "ar";

/// Primary subtags of scripts written right-to-left.
const RTL_LANGUAGES: &[&str] = &[
    "ar", "fa", "ur", "he", "iw", "yi", "ps", "sd", "ug", "ckb", "dv",
];

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The "detect it for me" source language.
    pub fn auto() -> Self {
        Self::new("auto")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0.eq_ignore_ascii_case("auto")
    }

    /// Primary language subtag, lowercased ("zh-CN" -> "zh").
    pub fn primary(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Whether text in this language is written right-to-left.
    pub fn is_rtl(&self) -> bool {
        let primary = self.primary();
        RTL_LANGUAGES.contains(&primary.as_str())
    }
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// RGB color with components in 0.0..=1.0, as used by PDF color operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(level: f32) -> Self {
        Self::new(level, level, level)
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn white() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "white" => Some(Self::white()),
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            "blue" => Some(Self::blue()),
            _ => None,
        }
    }

    /// Convert to RGB bytes (0-255)
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_rgb_bytes(&self) -> (u8, u8, u8) {
        // Values are clamped to 0.0-1.0 range, so conversion is safe
        (
            (self.r.clamp(0.0, 1.0) * 255.0) as u8,
            (self.g.clamp(0.0, 1.0) * 255.0) as u8,
            (self.b.clamp(0.0, 1.0) * 255.0) as u8,
        )
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Which translation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Public Google Translate endpoint, no key required
    #[default]
    Google,
    /// Any OpenAI-compatible chat-completions API (llama.cpp, Ollama, OpenAI, ...)
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "openai" | "open-ai" | "open_ai" => Ok(Self::OpenAi),
            other => Err(Error::ConfigInvalid {
                field: "translator.provider".to_string(),
                reason: format!("unknown provider '{other}' (expected google or openai)"),
            }),
        }
    }
}

/// Translator backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub provider: ProviderKind,
    /// Overrides the provider's default endpoint
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

pub const GOOGLE_API_BASE: &str = "https://translate.googleapis.com";
pub const OPENAI_API_BASE: &str = "http://localhost:8080/v1";

fn default_model() -> String {
    "default_model".to_string()
}

const fn default_timeout_seconds() -> u64 {
    60
}

impl TranslatorConfig {
    /// Create a config for an OpenAI-compatible endpoint
    pub fn openai(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            api_base: Some(api_base.into()),
            api_key,
            model: model.into(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Endpoint to use, falling back to the provider's default.
    pub fn effective_api_base(&self) -> &str {
        match (&self.api_base, self.provider) {
            (Some(base), _) => base,
            (None, ProviderKind::Google) => GOOGLE_API_BASE,
            (None, ProviderKind::OpenAi) => OPENAI_API_BASE,
        }
    }
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            api_base: None,
            api_key: None,
            model: default_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memory cache
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Memory budget for cached translations, in megabytes
    #[serde(default = "default_memory_max_mb")]
    pub memory_max_mb: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Enable disk cache
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Disk cache directory (defaults to ~/.cache/layout-translator)
    pub disk_path: Option<PathBuf>,
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_mb() -> u64 {
    64
}

impl CacheConfig {
    /// Memory layer only; nothing touches the disk.
    pub const fn memory_only() -> Self {
        Self {
            memory_enabled: true,
            memory_max_mb: default_memory_max_mb(),
            memory_ttl_seconds: 0,
            disk_enabled: false,
            disk_path: None,
        }
    }

    /// No caching at all.
    pub const fn disabled() -> Self {
        Self {
            memory_enabled: false,
            memory_max_mb: 0,
            memory_ttl_seconds: 0,
            disk_enabled: false,
            disk_path: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_mb: default_memory_max_mb(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
        }
    }
}

/// Chunking and fan-out settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on in-flight provider requests per job
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Soft limit on chunk length, in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

const fn default_max_concurrency() -> usize {
    10
}

const fn default_chunk_size() -> usize {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Overlay rendering settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderConfig {
    /// TrueType font to embed for translated text. Without it the standard
    /// Helvetica font is used, which only covers Latin-1.
    #[serde(default)]
    pub font_path: Option<PathBuf>,

    /// Force a color for translated text instead of the source run's color
    #[serde(default)]
    pub text_color: Option<TextColor>,

    /// Force a font size for translated text instead of the source run's size
    #[serde(default)]
    pub font_size: Option<f32>,
}

/// Job lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// How long finished tasks (and their results) are kept
    #[serde(default = "default_retention_seconds")]
    pub retention_seconds: u64,

    /// How often the background sweeper runs
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
}

const fn default_retention_seconds() -> u64 {
    3600
}

const fn default_sweep_interval_seconds() -> u64 {
    300
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            retention_seconds: default_retention_seconds(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Chunking and concurrency
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Overlay rendering
    #[serde(default)]
    pub render: RenderConfig,

    /// Task retention
    #[serde(default)]
    pub job: JobConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            target_lang: default_target_lang(),
            translator: TranslatorConfig::default(),
            cache: CacheConfig::default(),
            dispatch: DispatchConfig::default(),
            render: RenderConfig::default(),
            job: JobConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a single TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Layered load: defaults, then ~/.config/layout-translator/config.toml,
    /// then ./config.toml, then `LAYOUT_TRANSLATOR__*` environment variables.
    pub fn try_load() -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join(APP_DIR).join("config.toml");
            builder = builder.add_source(config::File::from(user_config).required(false));
        }

        let config: Self = builder
            .add_source(config::File::from(PathBuf::from("config.toml")).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .map_err(|e| Error::ConfigLoad(e.to_string()))?
            .try_deserialize()
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::try_load`], but falls back to defaults on error.
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_concurrency == 0 {
            return Err(Error::ConfigInvalid {
                field: "dispatch.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dispatch.chunk_size == 0 {
            return Err(Error::ConfigInvalid {
                field: "dispatch.chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let Some(size) = self.render.font_size
            && !(size.is_finite() && size > 0.0)
        {
            return Err(Error::ConfigInvalid {
                field: "render.font_size".to_string(),
                reason: format!("{size} is not a positive size"),
            });
        }
        if self.target_lang.as_str().trim().is_empty() || self.target_lang.is_auto() {
            return Err(Error::ConfigInvalid {
                field: "target_lang".to_string(),
                reason: "a concrete target language is required".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rtl_detection() {
        assert!(Lang::new("ar").is_rtl());
        assert!(Lang::new("fa-IR").is_rtl());
        assert!(Lang::new("HE").is_rtl());
        assert!(!Lang::new("en").is_rtl());
        assert!(!Lang::new("zh-CN").is_rtl());
    }

    #[test]
    fn test_primary_subtag() {
        assert_eq!(Lang::new("zh-CN").primary(), "zh");
        assert_eq!(Lang::new("pt_BR").primary(), "pt");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            target_lang = "fr"

            [translator]
            provider = "openai"
            api_base = "http://localhost:11434/v1"

            [dispatch]
            max_concurrency = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.target_lang.as_str(), "fr");
        assert_eq!(config.translator.provider, ProviderKind::OpenAi);
        assert_eq!(config.translator.effective_api_base(), "http://localhost:11434/v1");
        assert_eq!(config.dispatch.max_concurrency, 4);
        assert_eq!(config.dispatch.chunk_size, 1000);
        assert!(config.cache.memory_enabled);
        assert_eq!(config.job.retention_seconds, 3600);
    }

    #[test]
    fn test_default_provider_endpoint() {
        let config = TranslatorConfig::default();
        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.effective_api_base(), GOOGLE_API_BASE);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.dispatch.max_concurrency = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigInvalid { .. })));
    }

    #[test]
    fn test_validate_rejects_auto_target() {
        let config = AppConfig {
            target_lang: Lang::auto(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("google".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert!("deepl".parse::<ProviderKind>().is_err());
    }
}

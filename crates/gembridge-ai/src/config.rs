use std::time::Duration;

use crate::error::ProviderError;

/// Default chat model; overridable via `GEMINI_MODEL`.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash-preview-05-20";

/// The two Imagen variants the router picks between.
pub const IMAGE_MODEL_FAST: &str = "imagen-4.0-generate-001";
pub const IMAGE_MODEL_ADVANCED: &str = "imagen-4.0-ultra-generate-001";

pub const VIDEO_MODEL: &str = "veo-2.0-generate-001";

pub const MISSING_KEY_MESSAGE: &str = "GEMINI_API_KEY is not set; gembridged cannot start";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub chat_model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    /// Reads the provider configuration from the environment. A missing
    /// credential is the single fatal startup error of the whole server.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProviderError::Config(MISSING_KEY_MESSAGE.to_string()))?;

        let mut config = Self::new(api_key);
        if let Some(model) = std::env::var("GEMINI_MODEL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            config.chat_model = model;
        }
        if let Some(base_url) = std::env::var("GEMINI_BASE_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        {
            config.base_url = base_url;
        }
        if let Some(secs) = std::env::var("GEMBRIDGE_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs.clamp(1, 600));
        }
        Ok(config)
    }
}

impl std::fmt::Display for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // api_key deliberately omitted
        write!(
            f,
            "GeminiConfig {{ chat_model: {}, base_url: {} }}",
            self.chat_model, self.base_url
        )
    }
}

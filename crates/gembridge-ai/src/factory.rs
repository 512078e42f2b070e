use std::sync::Arc;

use crate::config::GeminiConfig;
use crate::error::ProviderError;
use crate::providers::GeminiBackend;
use crate::traits::GenerativeBackend;

pub fn build_backend(config: GeminiConfig) -> Result<Arc<dyn GenerativeBackend>, ProviderError> {
    Ok(Arc::new(GeminiBackend::new(config)?))
}

pub fn build_backend_from_env() -> Result<Arc<dyn GenerativeBackend>, ProviderError> {
    build_backend(GeminiConfig::from_env()?)
}

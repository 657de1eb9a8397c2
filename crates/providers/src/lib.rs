//! Model service implementations for murmur.
//!
//! All backends implement the `murmur_core::ModelService` trait: one prompt
//! string in, one completion string out. The OpenAI-compatible backend
//! covers the vast majority of hosted and local endpoints.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;

use std::sync::Arc;

use murmur_config::ModelConfig;
use murmur_core::error::ModelError;
use murmur_core::ModelService;

/// Build a model service from configuration.
pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn ModelService>, ModelError> {
    let api_key = config.api_key.clone().unwrap_or_default();

    let service = match config.provider.as_str() {
        "openai" => OpenAiCompatModel::openai(api_key, &config.model),
        "openrouter" => OpenAiCompatModel::openrouter(api_key, &config.model),
        "ollama" => OpenAiCompatModel::ollama(config.base_url.as_deref(), &config.model),
        "custom" => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                ModelError::NotConfigured("provider 'custom' requires base_url".into())
            })?;
            OpenAiCompatModel::new("custom", base_url, api_key, &config.model)
        }
        other => {
            return Err(ModelError::NotConfigured(format!(
                "unknown provider '{other}'"
            )));
        }
    };

    Ok(Arc::new(
        service.with_request_timeout(std::time::Duration::from_secs(config.request_timeout_secs)),
    ))
}

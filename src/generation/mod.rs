//! Text generation backends used by query enhancement, reranking and answers

pub mod ollama;
pub mod openai;

use crate::config::{GenerationConfig, GenerationProvider as ProviderKind};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single-turn completion of `prompt`
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn provider_name(&self) -> &str;
}

pub use ollama::OllamaGenerator;
pub use openai::OpenAIGenerator;

pub fn from_config(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match config.provider {
        ProviderKind::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY is required for openai generation".to_string())
            })?;
            Arc::new(OpenAIGenerator::new(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
                config.timeout_secs,
            )?)
        }
        ProviderKind::Ollama => Arc::new(OllamaGenerator::new(
            config.base_url.clone(),
            config.model.clone(),
            config.timeout_secs,
        )?),
    };
    Ok(generator)
}

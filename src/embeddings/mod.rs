pub mod hashing;
pub mod ollama;
pub mod openai;

use crate::config::{EmbeddingConfig, EmbeddingProvider as ProviderKind};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn provider_name(&self) -> &str;
}

pub use hashing::HashEmbedding;
pub use ollama::OllamaEmbedding;
pub use openai::OpenAIEmbedding;

/// Builds the configured provider
pub async fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        ProviderKind::OpenAI => {
            let api_key = config.api_key.clone().ok_or_else(|| {
                Error::Config("OPENAI_API_KEY is required for the openai provider".to_string())
            })?;
            Arc::new(OpenAIEmbedding::new(
                api_key,
                Some(config.model.clone()),
                config.base_url.clone(),
                config.timeout_secs,
            )?)
        }
        ProviderKind::Ollama => {
            let mut ollama = OllamaEmbedding::new(
                config.base_url.clone(),
                Some(config.model.clone()),
                config.timeout_secs,
            )?;
            ollama.initialize().await?;
            Arc::new(ollama)
        }
        ProviderKind::Hash => Arc::new(HashEmbedding::new(config.dimension)?),
    };

    tracing::info!(
        "[EMBEDDINGS] Using {} provider (dimension {})",
        provider.provider_name(),
        provider.dimension()
    );
    Ok(provider)
}

/// Embeds `texts` in fixed-size requests, preserving order
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let total_batches = texts.len().div_ceil(batch_size);
    let mut embeddings = Vec::with_capacity(texts.len());

    for (i, batch) in texts.chunks(batch_size).enumerate() {
        tracing::debug!("[EMBEDDINGS] Processing batch {}/{}", i + 1, total_batches);
        let batch_embeddings = provider.embed_batch(batch).await?;
        if batch_embeddings.len() != batch.len() {
            return Err(Error::ExternalService(format!(
                "{} returned {} embeddings for a batch of {}",
                provider.provider_name(),
                batch_embeddings.len(),
                batch.len()
            )));
        }
        embeddings.extend(batch_embeddings);
    }

    Ok(embeddings)
}

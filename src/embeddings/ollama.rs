use super::EmbeddingProvider;
use crate::{http, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

pub struct OllamaEmbedding {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_tokens: usize,
}

impl OllamaEmbedding {
    pub fn new(base_url: Option<String>, model: Option<String>, timeout_secs: u64) -> Result<Self> {
        let model_name = model.unwrap_or_else(|| "nomic-embed-text".to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let max_tokens = Self::default_max_tokens_for_model(&model_name);

        Ok(Self {
            client: http::client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model_name,
            dimension: 768,
            max_tokens,
        })
    }

    fn default_max_tokens_for_model(model: &str) -> usize {
        if model.contains("nomic-embed-text") || model.contains("snowflake-arctic-embed") {
            8192
        } else {
            2048
        }
    }

    /// Probes the model once and adopts the returned vector length
    pub async fn initialize(&mut self) -> Result<()> {
        let test_embedding = self.embed("test").await?;
        self.dimension = test_embedding.len();
        Ok(())
    }

    fn preprocess_text(&self, text: &str) -> String {
        if text.is_empty() {
            return " ".to_string();
        }

        let max_chars = self.max_tokens * 4;
        if text.len() > max_chars {
            text.chars().take(max_chars).collect()
        } else {
            text.to_string()
        }
    }

    async fn request(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input,
        };

        let url = format!("{}/api/embed", self.base_url);
        let response = http::send(self.client.post(&url).json(&request), "Ollama").await?;
        let embed_response: EmbedResponse = http::json(response, "Ollama").await?;
        Ok(embed_response.embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let processed = self.preprocess_text(text);
        self.request(serde_json::Value::String(processed))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ExternalService("Ollama returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input = serde_json::Value::Array(
            texts
                .iter()
                .map(|t| serde_json::Value::String(self.preprocess_text(t)))
                .collect(),
        );

        let embeddings = self.request(input).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::ExternalService(format!(
                "Ollama returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "Ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_initialize_detects_dimension() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(200)
                    .json_body(json!({"embeddings": [[0.5, 0.5, 0.0]]}));
            })
            .await;

        let mut provider = OllamaEmbedding::new(Some(server.base_url()), None, 5).unwrap();
        provider.initialize().await.unwrap();
        assert_eq!(provider.dimension(), 3);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embed");
                then.status(500).body("model not found");
            })
            .await;

        let provider = OllamaEmbedding::new(Some(server.base_url()), None, 5).unwrap();
        let err = provider.embed("bear").await.unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
        assert!(!err.is_rate_limited());
    }
}

use super::TextGenerator;
use crate::{http, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(base_url: Option<String>, model: String, timeout_secs: u64) -> Result<Self> {
        let base_url =
            base_url.unwrap_or_else(|| crate::embeddings::ollama::DEFAULT_BASE_URL.to_string());
        Ok(Self {
            client: http::client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = http::send(self.client.post(&url).json(&request), "Ollama").await?;
        let generated: GenerateResponse = http::json(response, "Ollama").await?;
        Ok(generated.response)
    }

    fn provider_name(&self) -> &str {
        "Ollama"
    }
}

//! Text utility handlers
//!
//! Chunking previews, single-text embedding and score normalization. None of
//! these open the search session.

use super::{CommandHandlers, Output};
use crate::chunking::{chunk_fixed, chunk_sentences};
use crate::search::normalize_scores;
use crate::{Error, Result};

#[derive(Debug, Clone, clap::Args)]
pub struct ChunkArgs {
    /// Text to split into word windows
    pub text: String,
    /// Words per chunk
    #[arg(long, default_value_t = 200)]
    pub chunk_size: usize,
    /// Words shared by consecutive chunks
    #[arg(long, default_value_t = 0)]
    pub overlap: usize,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ChunkSentencesArgs {
    /// Text to split into sentence windows
    pub text: String,
    /// Sentences per chunk
    #[arg(long, default_value_t = 4)]
    pub max_chunk_size: usize,
    /// Sentences shared by consecutive chunks
    #[arg(long, default_value_t = 0)]
    pub overlap: usize,
}

#[derive(Debug, Clone, clap::Args)]
pub struct EmbedArgs {
    /// Text to embed with the configured provider
    pub text: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct NormalizeArgs {
    /// Scores to min-max normalize, e.g. `1 6 8.2 9.1 4.0 1`
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub scores: Vec<f64>,
}

fn numbered(header: String, chunks: &[String]) -> String {
    let mut lines = vec![header];
    lines.extend(chunks.iter().enumerate().map(|(i, c)| format!("{}. {}", i + 1, c)));
    lines.join("\n")
}

impl CommandHandlers {
    pub async fn handle_chunk(&self, args: ChunkArgs) -> Result<Output> {
        let ChunkArgs {
            text,
            chunk_size,
            overlap,
        } = args;
        let chunks = chunk_fixed(&text, chunk_size, overlap)?;

        Ok(serde_json::json!({
            "message": numbered(format!("Chunking {} characters", text.chars().count()), &chunks),
            "chunks": chunks,
        }))
    }

    pub async fn handle_chunk_sentences(&self, args: ChunkSentencesArgs) -> Result<Output> {
        let ChunkSentencesArgs {
            text,
            max_chunk_size,
            overlap,
        } = args;
        let chunks = chunk_sentences(&text, max_chunk_size, overlap)?;

        Ok(serde_json::json!({
            "message": numbered(
                format!("Semantically chunking {} characters", text.chars().count()),
                &chunks
            ),
            "chunks": chunks,
        }))
    }

    pub async fn handle_embed(&self, args: EmbedArgs) -> Result<Output> {
        let EmbedArgs { text } = args;
        if text.trim().is_empty() {
            return Err(Error::Validation("text to embed must not be blank".to_string()));
        }

        let provider = self.provider().await?;
        let embedding = provider.embed(&text).await?;
        let preview: Vec<String> = embedding.iter().take(3).map(|v| format!("{v:.6}")).collect();

        Ok(serde_json::json!({
            "message": format!(
                "Text: {text}\nProvider: {}\nFirst 3 dimensions: [{}]\nDimensions: {}",
                provider.provider_name(),
                preview.join(", "),
                embedding.len()
            ),
            "provider": provider.provider_name(),
            "dimension": embedding.len(),
            "embedding": embedding,
        }))
    }

    pub async fn handle_normalize(&self, args: NormalizeArgs) -> Result<Output> {
        let normalized = normalize_scores(&args.scores);
        let lines: Vec<String> = normalized.iter().map(|s| format!("* {s:.4}")).collect();

        Ok(serde_json::json!({
            "message": lines.join("\n"),
            "scores": normalized,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::offline_config;
    use tempfile::tempdir;

    fn handlers() -> (tempfile::TempDir, CommandHandlers) {
        let dir = tempdir().unwrap();
        let handlers = CommandHandlers::new(offline_config(dir.path()));
        (dir, handlers)
    }

    #[tokio::test]
    async fn test_chunk_commands() {
        let (_dir, handlers) = handlers();

        let fixed = handlers
            .handle_chunk(ChunkArgs {
                text: "a b c d e f g".to_string(),
                chunk_size: 3,
                overlap: 1,
            })
            .await
            .unwrap();
        assert_eq!(fixed["chunks"], serde_json::json!(["a b c", "c d e", "e f g"]));
        assert!(fixed["message"].as_str().unwrap().starts_with("Chunking 13 characters\n1. a b c"));

        let bad = handlers
            .handle_chunk_sentences(ChunkSentencesArgs {
                text: "One. Two.".to_string(),
                max_chunk_size: 2,
                overlap: 2,
            })
            .await;
        assert!(matches!(bad, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_normalize_command() {
        let (_dir, handlers) = handlers();
        let output = handlers
            .handle_normalize(NormalizeArgs {
                scores: vec![1.0, 2.0, 3.0],
            })
            .await
            .unwrap();
        assert_eq!(output["scores"], serde_json::json!([0.0, 0.5, 1.0]));
        assert_eq!(output["message"], "* 0.0000\n* 0.5000\n* 1.0000");
    }

    #[tokio::test]
    async fn test_embed_uses_configured_provider() {
        let (_dir, handlers) = handlers();
        let output = handlers
            .handle_embed(EmbedArgs {
                text: "a bear in london".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(output["dimension"], 128);
        assert_eq!(output["provider"], "Hash");
    }
}

pub mod answer;
pub mod clear;
pub mod evaluate;
pub mod index;
pub mod search;
pub mod stats;
pub mod status;
pub mod text;

pub use answer::AnswerArgs;
pub use clear::ClearArgs;
pub use evaluate::EvaluateArgs;
pub use index::BuildArgs;
pub use search::{KeywordArgs, RrfArgs, SemanticArgs, WeightedArgs};
pub use stats::TermStatsArgs;
pub use status::StatusArgs;
pub use text::{ChunkArgs, ChunkSentencesArgs, EmbedArgs, NormalizeArgs};

use crate::embeddings::{self, EmbeddingProvider};
use crate::session::SearchSession;
use crate::types::FusedResult;
use crate::{Config, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Command results: a human-readable `message` plus structured fields
pub type Output = Value;

/// Shared state behind every CLI command. The search session is opened
/// lazily so text utilities never touch the corpus or the caches.
pub struct CommandHandlers {
    config: Config,
    session: OnceCell<Arc<SearchSession>>,
}

impl CommandHandlers {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    async fn session(&self) -> Result<Arc<SearchSession>> {
        let session = self
            .session
            .get_or_try_init(|| async {
                SearchSession::from_config(self.config.clone()).await.map(Arc::new)
            })
            .await?;
        Ok(session.clone())
    }

    async fn provider(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        if let Some(session) = self.session.get() {
            return Ok(session.provider().clone());
        }
        embeddings::from_config(&self.config.embedding).await
    }

    fn limit_or_default(&self, limit: Option<usize>) -> usize {
        limit.unwrap_or(self.config.search.default_limit)
    }
}

/// Text of an `Output`, falling back to compact JSON
pub fn render(output: &Output, json: bool) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(output)?);
    }
    Ok(match output.get("message").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => output.to_string(),
    })
}

/// Numbered listing of fused results with each signal's rank
fn describe_fused(results: &[FusedResult], score_label: &str, snippet_chars: usize) -> String {
    let mut lines = Vec::new();
    for (i, result) in results.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, result.document.title));
        lines.push(format!("   {score_label}: {:.4}", result.score));
        if let Some(score) = result.rerank_score {
            lines.push(format!("   Rerank Score: {score:.4}"));
        }
        let ranks: Vec<String> = result
            .signals
            .iter()
            .map(|s| match s.hit {
                Some(hit) => format!("{} rank {} ({:.4})", s.signal, hit.rank, hit.raw_score),
                None => format!("{} rank -", s.signal),
            })
            .collect();
        lines.push(format!("   {}", ranks.join(", ")));
        lines.push(format!("   {}", result.document.snippet(snippet_chars)));
    }
    if lines.is_empty() {
        return "No results found.".to_string();
    }
    lines.join("\n")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::EmbeddingProvider as ProviderKind;
    use std::path::Path;

    /// Offline configuration over a small corpus written into `dir`
    pub(crate) fn offline_config(dir: &Path) -> Config {
        let corpus = dir.join("movies.json");
        std::fs::write(
            &corpus,
            r#"{"movies": [
                {"id": 1, "title": "Paddington", "description": "A young bear from Peru travels to London. He loves marmalade."},
                {"id": 2, "title": "The Revenant", "description": "A frontiersman is mauled by a grizzly bear. He seeks revenge."},
                {"id": 3, "title": "Jaws", "description": "A great white shark terrorizes a beach town."}
            ]}"#,
        )
        .unwrap();

        let mut config = Config::default();
        config.embedding.provider = ProviderKind::Hash;
        config.embedding.dimension = 128;
        config.storage.data_dir = dir.to_path_buf();
        config.storage.cache_dir = dir.join("cache");
        config.storage.corpus_path = corpus;
        config.storage.golden_dataset_path = dir.join("golden_dataset.json");
        config
    }

    #[test]
    fn test_render_prefers_message() {
        let output = serde_json::json!({"message": "hello", "count": 2});
        assert_eq!(render(&output, false).unwrap(), "hello");
        assert!(render(&output, true).unwrap().contains("\"count\": 2"));
    }
}

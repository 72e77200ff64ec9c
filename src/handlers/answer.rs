//! Retrieval-augmented answer handler

use super::{CommandHandlers, Output};
use crate::answer::{AnswerMode, AnswerSynthesizer};
use crate::generation;
use crate::retry::RetryPolicy;
use crate::Result;

#[derive(Debug, Clone, clap::Args)]
pub struct AnswerArgs {
    /// How the retrieved documents are turned into a response
    #[arg(value_enum)]
    pub mode: AnswerMode,
    /// Question or search query
    pub query: String,
    /// Documents retrieved as context
    #[arg(long)]
    pub limit: Option<usize>,
}

impl CommandHandlers {
    pub async fn handle_answer(&self, args: AnswerArgs) -> Result<Output> {
        let AnswerArgs { mode, query, limit } = args;
        let limit = self.limit_or_default(limit);

        let search = self.session().await?.hybrid().await;
        let synthesizer = AnswerSynthesizer::new(
            search,
            generation::from_config(&self.config.generation)?,
            RetryPolicy::from(&self.config.retry),
            self.config.search.rrf_k,
        );
        let answer = synthesizer.answer(mode, &query, limit).await?;

        let heading = match mode {
            AnswerMode::Rag => "RAG Response:",
            AnswerMode::Summarize => "LLM Summary:",
            AnswerMode::Citations => "LLM Answer:",
            AnswerMode::Question => "Answer:",
        };
        let mut lines = vec!["Search Results:".to_string()];
        lines.extend(answer.relevant_docs.iter().map(|r| format!("    - {}", r.document.title)));
        lines.push(format!("\n{heading}"));
        lines.push(answer.response.clone());

        Ok(serde_json::json!({
            "message": lines.join("\n"),
            "mode": mode,
            "query": query,
            "relevant_docs": answer.relevant_docs,
            "response": answer.response,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationProvider;
    use crate::handlers::tests::offline_config;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_answer_through_ollama_generator() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/generate");
                then.status(200)
                    .json_body(serde_json::json!({"response": "Try Jaws."}));
            })
            .await;

        let dir = tempdir().unwrap();
        let mut config = offline_config(dir.path());
        config.generation.provider = GenerationProvider::Ollama;
        config.generation.base_url = Some(server.base_url());
        let handlers = CommandHandlers::new(config);

        let output = handlers
            .handle_answer(AnswerArgs {
                mode: AnswerMode::Question,
                query: "any shark movies?".to_string(),
                limit: Some(2),
            })
            .await
            .unwrap();
        assert_eq!(output["response"], "Try Jaws.");
        assert_eq!(output["mode"], "question");
        assert!(output["message"].as_str().unwrap().contains("\nAnswer:\nTry Jaws."));
    }
}

//! Retrieval-augmented answers over RRF results

use crate::generation::TextGenerator;
use crate::retry::{with_retry, RetryPolicy};
use crate::search::HybridSearch;
use crate::types::FusedResult;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    /// Answer from the retrieved documents
    Rag,
    /// Synthesize several results into a short overview
    Summarize,
    /// Answer citing sources as [1], [2], ...
    Citations,
    /// Casual conversational answer to a question
    Question,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub relevant_docs: Vec<FusedResult>,
    pub response: String,
}

#[derive(Serialize)]
struct PromptDocument<'a> {
    id: u64,
    title: &'a str,
    description: &'a str,
}

fn documents_json(results: &[FusedResult]) -> Result<String> {
    let documents: Vec<PromptDocument> = results
        .iter()
        .map(|r| PromptDocument {
            id: r.document.id,
            title: &r.document.title,
            description: &r.document.description,
        })
        .collect();
    Ok(serde_json::to_string(&documents)?)
}

const SERVICE_CONTEXT: &str =
    "This should be tailored to SilasStreaming users. SilasStreaming is a movie streaming service.";

impl AnswerMode {
    fn prompt(&self, query: &str, documents: &str) -> String {
        match self {
            AnswerMode::Rag => format!(
                "Answer the question or provide information based on the provided documents. \
                 {SERVICE_CONTEXT}\n\n\
                 Query: {query}\n\n\
                 Documents:\n{documents}\n\n\
                 Provide a comprehensive answer that addresses the query:"
            ),
            AnswerMode::Summarize => format!(
                "Provide information useful to this query by synthesizing information from multiple search results in detail.\n\
                 The goal is to provide comprehensive information so that users know what their options are.\n\
                 Your response should be information-dense and concise, with several key pieces of information \
                 about the genre, plot, etc. of each movie.\n\
                 {SERVICE_CONTEXT}\n\
                 Query: {query}\n\
                 Search Results:\n{documents}\n\
                 Provide a comprehensive 3-4 sentence answer that combines information from multiple sources:"
            ),
            AnswerMode::Citations => format!(
                "Answer the question or provide information based on the provided documents.\n\n\
                 {SERVICE_CONTEXT}\n\n\
                 If not enough information is available to give a good answer, say so but give as good of an \
                 answer as you can while citing the sources you have.\n\n\
                 Query: {query}\n\n\
                 Documents:\n{documents}\n\n\
                 Instructions:\n\
                 - Provide a comprehensive answer that addresses the query\n\
                 - Cite sources using [1], [2], etc. format when referencing information\n\
                 - If sources disagree, mention the different viewpoints\n\
                 - If the answer isn't in the documents, say \"I don't have enough information\"\n\
                 - Be direct and informative\n\n\
                 Answer:"
            ),
            AnswerMode::Question => format!(
                "Answer the user's question based on the provided movies that are available on SilasStreaming.\n\n\
                 {SERVICE_CONTEXT}\n\n\
                 Question: {query}\n\n\
                 Documents:\n{documents}\n\n\
                 Instructions:\n\
                 - Answer questions directly and concisely\n\
                 - Be casual and conversational\n\
                 - Don't be cringe or hype-y\n\
                 - Talk like a normal person would in a chat conversation\n\n\
                 Answer:"
            ),
        }
    }
}

pub struct AnswerSynthesizer {
    search: HybridSearch,
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
    rrf_k: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        search: HybridSearch,
        generator: Arc<dyn TextGenerator>,
        retry: RetryPolicy,
        rrf_k: usize,
    ) -> Self {
        Self {
            search,
            generator,
            retry,
            rrf_k,
        }
    }

    pub async fn answer(&self, mode: AnswerMode, query: &str, limit: usize) -> Result<Answer> {
        let relevant_docs = self.search.rrf_search(query, self.rrf_k, limit).await?;
        let prompt = mode.prompt(query, &documents_json(&relevant_docs)?);

        tracing::info!(
            "[ANSWER] Generating {:?} answer from {} documents with {}",
            mode,
            relevant_docs.len(),
            self.generator.provider_name()
        );
        let response = with_retry(&self.retry, "answer generation", || {
            self.generator.complete(&prompt)
        })
        .await?;

        Ok(Answer {
            relevant_docs,
            response: response.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingProvider, HashEmbedding};
    use crate::enhance::tests::{fast_retry, ScriptedGenerator};
    use crate::search::{Bm25Params, IndexSnapshot, LexicalIndex, SemanticIndex, SemanticParams};
    use crate::tokenizer::TextTokenizer;
    use crate::types::Document;
    use crate::Error;

    async fn search() -> HybridSearch {
        let docs = vec![
            Document::new(1, "Jaws", "A great white shark terrorizes a beach town."),
            Document::new(2, "Paddington", "A bear from Peru moves to London."),
        ];
        let lexical =
            LexicalIndex::build(&docs, Arc::new(TextTokenizer::default()), Bm25Params::default())
                .unwrap();
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedding::new(128).unwrap());
        let semantic = SemanticIndex::build(&docs, provider, SemanticParams::default())
            .await
            .unwrap();
        HybridSearch::new(Arc::new(IndexSnapshot::new(lexical, semantic)))
    }

    #[tokio::test]
    async fn test_citations_prompt_embeds_documents() {
        let generator = Arc::new(ScriptedGenerator::replying(&["Jaws [1] is about a shark.\n"]));
        let synthesizer = AnswerSynthesizer::new(search().await, generator.clone(), fast_retry(), 60);

        let answer = synthesizer
            .answer(AnswerMode::Citations, "shark movie", 1)
            .await
            .unwrap();
        assert_eq!(answer.response, "Jaws [1] is about a shark.");
        assert_eq!(answer.relevant_docs[0].document.title, "Jaws");

        let prompt = generator.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Cite sources using [1], [2]"));
        assert!(prompt.contains("\"title\":\"Jaws\""));
    }

    #[tokio::test]
    async fn test_generation_failure_propagates() {
        let generator = Arc::new(ScriptedGenerator::new(vec![Err(Error::ExternalService(
            "down".to_string(),
        ))]));
        let synthesizer = AnswerSynthesizer::new(search().await, generator, fast_retry(), 60);

        assert!(matches!(
            synthesizer.answer(AnswerMode::Rag, "bear", 2).await,
            Err(Error::ExternalService(_))
        ));
    }
}

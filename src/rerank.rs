//! Second-stage reordering of fused results
//!
//! Every strategy either returns a complete reordering or fails. A partial or
//! unparseable answer from the backing model is an `ExternalService` error.

use crate::config::{Config, CrossEncoderConfig};
use crate::generation::{self, TextGenerator};
use crate::retry::{with_retry, RetryPolicy};
use crate::types::{DocId, FusedResult};
use crate::{http, Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, results: Vec<FusedResult>) -> Result<Vec<FusedResult>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RerankMethod {
    /// Score every result separately with the LLM
    Individual,
    /// Ask the LLM for one ordering of all results
    Batch,
    /// Score (query, document) pairs with a cross-encoder service
    #[value(name = "cross_encoder")]
    CrossEncoder,
}

impl RerankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RerankMethod::Individual => "individual",
            RerankMethod::Batch => "batch",
            RerankMethod::CrossEncoder => "cross_encoder",
        }
    }
}

/// Builds the strategy behind `method` from configuration
pub fn from_config(method: RerankMethod, config: &Config) -> Result<Arc<dyn Reranker>> {
    let retry = RetryPolicy::from(&config.retry);
    let reranker: Arc<dyn Reranker> = match method {
        RerankMethod::Individual => Arc::new(LlmIndividualReranker::new(
            generation::from_config(&config.generation)?,
            retry,
        )),
        RerankMethod::Batch => Arc::new(LlmBatchReranker::new(
            generation::from_config(&config.generation)?,
            retry,
        )),
        RerankMethod::CrossEncoder => Arc::new(CrossEncoderReranker::new(
            Arc::new(HttpCrossEncoder::new(&config.cross_encoder)?),
            retry,
        )),
    };
    Ok(reranker)
}

fn document_text(result: &FusedResult) -> String {
    format!("{} - {}", result.document.title, result.document.description)
}

/// Stable sort by rerank score, then number the new order from 1
fn order_by_rerank_score(mut results: Vec<FusedResult>) -> Vec<FusedResult> {
    results.sort_by(|a, b| {
        let a = a.rerank_score.unwrap_or(f64::NEG_INFINITY);
        let b = b.rerank_score.unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });
    for (i, result) in results.iter_mut().enumerate() {
        result.rerank_rank = Some(i + 1);
    }
    results
}

pub struct LlmIndividualReranker {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
}

impl LlmIndividualReranker {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    fn prompt(query: &str, result: &FusedResult) -> String {
        format!(
            "Rate how well this movie matches the search query.\n\n\
             Query: \"{query}\"\n\
             Movie: {}\n\n\
             Consider:\n\
             - Direct relevance to query\n\
             - User intent (what they're looking for)\n\
             - Content appropriateness\n\n\
             Rate 0-10 (10 = perfect match).\n\
             Give me ONLY the number in your response, no other text or explanation.\n\n\
             Score:",
            document_text(result)
        )
    }
}

#[async_trait]
impl Reranker for LlmIndividualReranker {
    async fn rerank(&self, query: &str, mut results: Vec<FusedResult>) -> Result<Vec<FusedResult>> {
        for result in &mut results {
            let prompt = Self::prompt(query, result);
            let response = with_retry(&self.retry, "individual rerank", || {
                self.generator.complete(&prompt)
            })
            .await?;

            let score: f64 = response.trim().parse().map_err(|e| {
                Error::ExternalService(format!(
                    "failed to parse rerank score '{}' for '{}': {e}",
                    response.trim(),
                    result.document.title
                ))
            })?;
            result.rerank_score = Some(score);
        }

        tracing::info!("[RERANK] Scored {} results individually", results.len());
        Ok(order_by_rerank_score(results))
    }
}

pub struct LlmBatchReranker {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct BatchEntry<'a> {
    id: DocId,
    title: &'a str,
    description: &'a str,
}

impl LlmBatchReranker {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    fn prompt(query: &str, results: &[FusedResult]) -> Result<String> {
        let entries: Vec<BatchEntry> = results
            .iter()
            .map(|r| BatchEntry {
                id: r.document.id,
                title: &r.document.title,
                description: &r.document.description,
            })
            .collect();
        let movies = serde_json::to_string(&entries)?;

        Ok(format!(
            "Rank these movies by relevance to the search query.\n\n\
             Query: \"{query}\"\n\n\
             Movies:\n{movies}\n\n\
             Return ONLY the document IDs in order of relevance (best match first). \
             Return a valid JSON list, nothing else. For example:\n\n\
             [75, 12, 34, 2, 1]"
        ))
    }
}

/// Strips a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => text,
    }
}

/// Parses the model's id list and requires it to be a permutation of `expected`
fn parse_ordering(response: &str, expected: &[DocId]) -> Result<Vec<DocId>> {
    let ids: Vec<DocId> = serde_json::from_str(strip_code_fence(response)).map_err(|e| {
        Error::ExternalService(format!("failed to parse batch rerank response '{response}': {e}"))
    })?;

    let returned: BTreeSet<DocId> = ids.iter().copied().collect();
    let wanted: BTreeSet<DocId> = expected.iter().copied().collect();
    if ids.len() != expected.len() || returned != wanted {
        return Err(Error::ExternalService(format!(
            "batch rerank returned {ids:?}, expected a permutation of {expected:?}"
        )));
    }
    Ok(ids)
}

#[async_trait]
impl Reranker for LlmBatchReranker {
    async fn rerank(&self, query: &str, results: Vec<FusedResult>) -> Result<Vec<FusedResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let prompt = Self::prompt(query, &results)?;
        let response = with_retry(&self.retry, "batch rerank", || {
            self.generator.complete(&prompt)
        })
        .await?;

        let expected: Vec<DocId> = results.iter().map(|r| r.document.id).collect();
        let ordering = parse_ordering(&response, &expected)?;

        let mut by_id: HashMap<DocId, FusedResult> =
            results.into_iter().map(|r| (r.document.id, r)).collect();
        let mut reranked = Vec::with_capacity(ordering.len());
        for (i, id) in ordering.into_iter().enumerate() {
            if let Some(mut result) = by_id.remove(&id) {
                result.rerank_rank = Some(i + 1);
                reranked.push(result);
            }
        }

        tracing::info!("[RERANK] Batch reordered {} results", reranked.len());
        Ok(reranked)
    }
}

/// Relevance scores for (query, document) pairs, one per document in input order
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>>;
}

/// Client for a text-embeddings-inference style `POST /rerank` endpoint
pub struct HttpCrossEncoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct RerankScore {
    index: usize,
    score: f32,
}

impl HttpCrossEncoder {
    pub fn new(config: &CrossEncoderConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CrossEncoder for HttpCrossEncoder {
    async fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let url = format!("{}/rerank", self.base_url);
        let request = RerankRequest {
            query,
            texts: documents,
        };
        let response = http::send(self.client.post(&url).json(&request), "Cross-encoder").await?;
        let scored: Vec<RerankScore> = http::json(response, "Cross-encoder").await?;

        let mut scores: Vec<Option<f32>> = vec![None; documents.len()];
        for entry in scored {
            match scores.get_mut(entry.index) {
                Some(slot) if slot.is_none() => *slot = Some(entry.score),
                _ => {
                    return Err(Error::ExternalService(format!(
                        "cross-encoder returned an unexpected index {}",
                        entry.index
                    )))
                }
            }
        }

        scores
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                s.ok_or_else(|| {
                    Error::ExternalService(format!("cross-encoder returned no score for document {i}"))
                })
            })
            .collect()
    }
}

pub struct CrossEncoderReranker {
    encoder: Arc<dyn CrossEncoder>,
    retry: RetryPolicy,
}

impl CrossEncoderReranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, retry: RetryPolicy) -> Self {
        Self { encoder, retry }
    }
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(&self, query: &str, mut results: Vec<FusedResult>) -> Result<Vec<FusedResult>> {
        if results.is_empty() {
            return Ok(results);
        }

        let texts: Vec<String> = results.iter().map(document_text).collect();
        let scores = with_retry(&self.retry, "cross-encoder rerank", || {
            self.encoder.score(query, &texts)
        })
        .await?;

        if scores.len() != results.len() {
            return Err(Error::ExternalService(format!(
                "cross-encoder returned {} scores for {} documents",
                scores.len(),
                results.len()
            )));
        }

        for (result, score) in results.iter_mut().zip(scores) {
            result.rerank_score = Some(f64::from(score));
        }

        tracing::info!("[RERANK] Cross-encoder scored {} results", results.len());
        Ok(order_by_rerank_score(results))
    }
}

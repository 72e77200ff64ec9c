//! Chunked embedding search
//!
//! Every document description is split into overlapping sentence windows and
//! each window is embedded. A query is compared against every chunk and the
//! chunk scores are folded back into one score per document.

use super::{RankingSignal, SEMANTIC_SIGNAL};
use crate::cache;
use crate::chunking::{chunk_document, ChunkParams};
use crate::config::{CachePolicy, Config};
use crate::embeddings::{embed_in_batches, EmbeddingProvider};
use crate::types::{by_score_then_id, Candidate, ChunkMetadata, Document, SemanticHit};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

const EMBEDDINGS_FILE: &str = "chunk_embeddings.bin";
const METADATA_FILE: &str = "chunk_metadata.json";

/// How chunk similarities collapse into a document score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkAggregation {
    /// Best matching chunk wins
    #[default]
    Max,
    Mean,
    /// Mean of the `top_k` best chunks
    TopKMean,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SemanticParams {
    pub chunking: ChunkParams,
    pub batch_size: usize,
    pub snippet_chars: usize,
    pub aggregation: ChunkAggregation,
    pub top_k: usize,
}

impl Default for SemanticParams {
    fn default() -> Self {
        Self {
            chunking: ChunkParams::default(),
            batch_size: 16,
            snippet_chars: 200,
            aggregation: ChunkAggregation::Max,
            top_k: 3,
        }
    }
}

impl From<&Config> for SemanticParams {
    fn from(config: &Config) -> Self {
        Self {
            chunking: ChunkParams::from(&config.chunking),
            batch_size: config.embedding.batch_size,
            snippet_chars: config.search.snippet_chars,
            aggregation: config.search.aggregation,
            top_k: config.search.aggregation_top_k,
        }
    }
}

/// JSON sidecar persisted next to the embedding matrix
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkManifest {
    chunks: Vec<ChunkMetadata>,
    total_chunks: usize,
    document_count: usize,
    dimension: usize,
    built_at: String,
}

pub struct SemanticIndex {
    provider: Arc<dyn EmbeddingProvider>,
    params: SemanticParams,
    documents: Vec<Document>,
    embeddings: Vec<Vec<f32>>,
    manifest: ChunkManifest,
}

/// Cosine of the angle between `u` and `v`; 0.0 for a zero vector or mismatched lengths
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f64 {
    if u.len() != v.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_u = 0.0f64;
    let mut norm_v = 0.0f64;
    for (a, b) in u.iter().zip(v) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        norm_u += a * a;
        norm_v += b * b;
    }

    if norm_u == 0.0 || norm_v == 0.0 {
        return 0.0;
    }
    dot / (norm_u.sqrt() * norm_v.sqrt())
}

fn aggregate(policy: ChunkAggregation, top_k: usize, mut scores: Vec<f64>) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    match policy {
        ChunkAggregation::Max => scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ChunkAggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
        ChunkAggregation::TopKMean => {
            scores.sort_by(|a, b| b.total_cmp(a));
            scores.truncate(top_k.max(1));
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }
}

impl SemanticIndex {
    pub async fn build(
        documents: &[Document],
        provider: Arc<dyn EmbeddingProvider>,
        params: SemanticParams,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::DegenerateInput(
                "cannot build a semantic index from an empty corpus".to_string(),
            ));
        }

        let mut texts = Vec::new();
        let mut chunks = Vec::new();
        for (doc_index, doc) in documents.iter().enumerate() {
            if doc.description.trim().is_empty() {
                continue;
            }
            for chunk in chunk_document(doc_index, &doc.description, params.chunking)? {
                chunks.push(ChunkMetadata::from(&chunk));
                texts.push(chunk.text);
            }
        }

        tracing::info!(
            "[SEMANTIC] Embedding {} chunks from {} documents with {}",
            texts.len(),
            documents.len(),
            provider.provider_name()
        );

        let embeddings = embed_in_batches(provider.as_ref(), &texts, params.batch_size).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::ExternalService(format!(
                "expected {} chunk embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings.first().map_or(provider.dimension(), Vec::len);
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(Error::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        let manifest = ChunkManifest {
            total_chunks: chunks.len(),
            chunks,
            document_count: documents.len(),
            dimension,
            built_at: Utc::now().to_rfc3339(),
        };

        Ok(Self {
            provider,
            params,
            documents: documents.to_vec(),
            embeddings,
            manifest,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.manifest.total_chunks
    }

    pub fn document_count(&self) -> usize {
        self.manifest.document_count
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }

    pub fn built_at(&self) -> &str {
        &self.manifest.built_at
    }

    pub fn chunks(&self) -> &[ChunkMetadata] {
        &self.manifest.chunks
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let manifest = serde_json::to_vec_pretty(&self.manifest)?;
        cache::write_all(
            dir,
            &[
                (EMBEDDINGS_FILE, cache::encode(&self.embeddings)?),
                (METADATA_FILE, manifest),
            ],
        )?;

        tracing::info!(
            "[SEMANTIC] Saved {} chunk embeddings to {}",
            self.manifest.total_chunks,
            dir.display()
        );
        Ok(())
    }

    /// Loads persisted chunk embeddings for `documents`; any absent or inconsistent
    /// artifact is a `MissingCache`
    pub fn load(
        dir: &Path,
        documents: &[Document],
        provider: Arc<dyn EmbeddingProvider>,
        params: SemanticParams,
    ) -> Result<Self> {
        let embeddings: Vec<Vec<f32>> = cache::read_bincode(dir, EMBEDDINGS_FILE)?;
        let manifest: ChunkManifest = cache::read_json(dir, METADATA_FILE)?;

        if embeddings.len() != manifest.total_chunks || manifest.chunks.len() != manifest.total_chunks {
            return Err(Error::MissingCache(format!(
                "semantic cache holds {} embeddings for {} chunks",
                embeddings.len(),
                manifest.total_chunks
            )));
        }
        if embeddings.iter().any(|e| e.len() != manifest.dimension) {
            return Err(Error::MissingCache(
                "semantic cache has embeddings of mixed dimension".to_string(),
            ));
        }
        if manifest.document_count != documents.len()
            || manifest.chunks.iter().any(|c| c.doc_index >= documents.len())
        {
            return Err(Error::MissingCache(format!(
                "semantic cache was built for {} documents, corpus has {}",
                manifest.document_count,
                documents.len()
            )));
        }

        tracing::info!(
            "[SEMANTIC] Loaded {} chunk embeddings from {}",
            manifest.total_chunks,
            dir.display()
        );

        Ok(Self {
            provider,
            params,
            documents: documents.to_vec(),
            embeddings,
            manifest,
        })
    }

    pub async fn load_or_build(
        dir: &Path,
        documents: &[Document],
        provider: Arc<dyn EmbeddingProvider>,
        params: SemanticParams,
        policy: CachePolicy,
    ) -> Result<Self> {
        let reason = match Self::load(dir, documents, provider.clone(), params) {
            Ok(index) => return Ok(index),
            Err(e) => e.to_string(),
        };

        match policy {
            CachePolicy::Require => Err(Error::MissingCache(reason)),
            CachePolicy::Rebuild => {
                tracing::info!("[SEMANTIC] Rebuilding chunk embeddings: {reason}");
                let index = Self::build(documents, provider, params).await?;
                index.save(dir)?;
                Ok(index)
            }
        }
    }

    async fn ranked_indices(&self, query: &str, limit: usize) -> Result<Vec<(usize, f64)>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::Validation("query must not be blank".to_string()));
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.provider.embed(query).await?;
        if query_embedding.len() != self.manifest.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.manifest.dimension,
                actual: query_embedding.len(),
            });
        }

        let similarities: Vec<f64> = self
            .embeddings
            .par_iter()
            .map(|chunk| cosine_similarity(&query_embedding, chunk))
            .collect();

        let mut per_document: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for (meta, score) in self.manifest.chunks.iter().zip(similarities) {
            per_document.entry(meta.doc_index).or_default().push(score);
        }

        let mut ranked: Vec<(usize, f64)> = per_document
            .into_iter()
            .map(|(doc_index, scores)| {
                (doc_index, aggregate(self.params.aggregation, self.params.top_k, scores))
            })
            .collect();
        ranked.sort_by(|a, b| {
            by_score_then_id(
                (a.1, self.documents[a.0].id),
                (b.1, self.documents[b.0].id),
            )
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    pub async fn search_chunks(&self, query: &str, limit: usize) -> Result<Vec<SemanticHit>> {
        Ok(self
            .ranked_indices(query, limit)
            .await?
            .into_iter()
            .map(|(doc_index, score)| {
                let doc = &self.documents[doc_index];
                SemanticHit {
                    id: doc.id,
                    title: doc.title.clone(),
                    snippet: doc.snippet(self.params.snippet_chars),
                    score,
                }
            })
            .collect())
    }
}

#[async_trait]
impl RankingSignal for SemanticIndex {
    fn name(&self) -> &str {
        SEMANTIC_SIGNAL
    }

    async fn candidates(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        Ok(self
            .ranked_indices(query, limit)
            .await?
            .into_iter()
            .enumerate()
            .map(|(i, (doc_index, score))| Candidate {
                doc_id: self.documents[doc_index].id,
                rank: i + 1,
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashEmbedding;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingProvider {
        inner: HashEmbedding,
        batches: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingProvider {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.inner.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts).await
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn provider_name(&self) -> &str {
            "Counting"
        }
    }

    fn provider() -> Arc<dyn EmbeddingProvider> {
        Arc::new(HashEmbedding::new(256).unwrap())
    }

    fn corpus() -> Vec<Document> {
        vec![
            Document::new(
                10,
                "Paddington",
                "A young bear travels from Peru to London. He is adopted by the Brown family. \
                 He loves marmalade sandwiches. A taxidermist hunts him. The family rescues him.",
            ),
            Document::new(
                20,
                "The Revenant",
                "A frontiersman is mauled by a grizzly bear. His companions leave him for dead.",
            ),
            Document::new(30, "Untitled", "   "),
        ]
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_aggregation_policies() {
        let scores = vec![0.2, 0.8, 0.5];
        assert_eq!(aggregate(ChunkAggregation::Max, 3, scores.clone()), 0.8);
        assert!((aggregate(ChunkAggregation::Mean, 3, scores.clone()) - 0.5).abs() < 1e-12);
        assert!((aggregate(ChunkAggregation::TopKMean, 2, scores) - 0.65).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_build_skips_blank_descriptions() {
        let index = SemanticIndex::build(&corpus(), provider(), SemanticParams::default())
            .await
            .unwrap();

        assert_eq!(index.document_count(), 3);
        // 5 sentences -> 2 windows, 2 sentences -> 1 window
        assert_eq!(index.chunk_count(), 3);
        assert!(index.chunks().iter().all(|c| c.doc_index != 2));
        assert_eq!(index.dimension(), 256);
    }

    #[tokio::test]
    async fn test_build_rejects_empty_corpus() {
        let result = SemanticIndex::build(&[], provider(), SemanticParams::default()).await;
        assert!(matches!(result, Err(Error::DegenerateInput(_))));
    }

    #[tokio::test]
    async fn test_search_chunks() {
        let index = SemanticIndex::build(&corpus(), provider(), SemanticParams::default())
            .await
            .unwrap();

        let hits = index.search_chunks("marmalade sandwiches", 5).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, 10);
        assert_eq!(hits[0].title, "Paddington");
        assert!(hits[0].snippet.chars().count() <= 200);

        assert!(matches!(
            index.search_chunks("   ", 5).await,
            Err(Error::Validation(_))
        ));
        assert!(index.search_chunks("bear", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_dimension_must_match() {
        let index = SemanticIndex::build(&corpus(), provider(), SemanticParams::default())
            .await
            .unwrap();
        let dir = tempdir().unwrap();
        index.save(dir.path()).unwrap();

        let narrow: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedding::new(8).unwrap());
        let reloaded =
            SemanticIndex::load(dir.path(), &corpus(), narrow, SemanticParams::default()).unwrap();
        let err = reloaded.search_chunks("bear", 3).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 256, actual: 8 }));
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let index = SemanticIndex::build(&corpus(), provider(), SemanticParams::default())
            .await
            .unwrap();
        index.save(dir.path()).unwrap();
        assert!(dir.path().join(METADATA_FILE).exists());

        let loaded =
            SemanticIndex::load(dir.path(), &corpus(), provider(), SemanticParams::default())
                .unwrap();
        assert_eq!(loaded.embeddings, index.embeddings);
        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(
            loaded.search_chunks("grizzly", 2).await.unwrap(),
            index.search_chunks("grizzly", 2).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_load_or_build_reuses_cache_and_detects_drift() {
        let dir = tempdir().unwrap();
        let counting = Arc::new(CountingProvider {
            inner: HashEmbedding::new(64).unwrap(),
            batches: AtomicUsize::new(0),
        });
        let docs = corpus();

        let required = SemanticIndex::load_or_build(
            dir.path(),
            &docs,
            counting.clone(),
            SemanticParams::default(),
            CachePolicy::Require,
        )
        .await;
        assert!(matches!(required, Err(Error::MissingCache(_))));

        SemanticIndex::load_or_build(
            dir.path(),
            &docs,
            counting.clone(),
            SemanticParams::default(),
            CachePolicy::Rebuild,
        )
        .await
        .unwrap();
        let after_build = counting.batches.load(Ordering::SeqCst);
        assert!(after_build > 0);

        SemanticIndex::load_or_build(
            dir.path(),
            &docs,
            counting.clone(),
            SemanticParams::default(),
            CachePolicy::Require,
        )
        .await
        .unwrap();
        assert_eq!(counting.batches.load(Ordering::SeqCst), after_build);

        let mut grown = docs.clone();
        grown.push(Document::new(40, "Brave", "A princess turns her mother into a bear."));
        let rebuilt = SemanticIndex::load_or_build(
            dir.path(),
            &grown,
            counting.clone(),
            SemanticParams::default(),
            CachePolicy::Rebuild,
        )
        .await
        .unwrap();
        assert_eq!(rebuilt.document_count(), 4);
        assert!(counting.batches.load(Ordering::SeqCst) > after_build);
    }

    #[tokio::test]
    async fn test_candidates_named_semantic() {
        let index = SemanticIndex::build(&corpus(), provider(), SemanticParams::default())
            .await
            .unwrap();
        let candidates = index.candidates("bear", 10).await.unwrap();
        assert_eq!(index.name(), "semantic");
        assert_eq!(candidates.iter().map(|c| c.rank).collect::<Vec<_>>(), vec![1, 2]);
    }
}

use super::fusion::{reciprocal_rank_fusion, weighted_fusion, Fused};
use super::IndexSnapshot;
use crate::config::SearchConfig;
use crate::enhance::QueryEnhancer;
use crate::rerank::Reranker;
use crate::types::{Candidate, FusedResult, SignalScore};
use crate::{Error, Result};
use std::sync::Arc;

/// How many candidates each signal contributes before fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatePolicy {
    pub multiplier: usize,
    pub floor: usize,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            multiplier: 20,
            floor: 200,
        }
    }
}

impl CandidatePolicy {
    pub fn candidate_limit(&self, limit: usize) -> usize {
        limit.saturating_mul(self.multiplier).max(self.floor)
    }
}

impl From<&SearchConfig> for CandidatePolicy {
    fn from(config: &SearchConfig) -> Self {
        Self {
            multiplier: config.candidate_multiplier,
            floor: config.candidate_floor,
        }
    }
}

/// Fuses keyword and semantic rankings over one immutable snapshot
#[derive(Clone)]
pub struct HybridSearch {
    snapshot: Arc<IndexSnapshot>,
    candidates: CandidatePolicy,
    enhancer: Option<Arc<dyn QueryEnhancer>>,
    reranker: Option<Arc<dyn Reranker>>,
    rerank_pool_factor: usize,
}

impl HybridSearch {
    pub fn new(snapshot: Arc<IndexSnapshot>) -> Self {
        Self {
            snapshot,
            candidates: CandidatePolicy::default(),
            enhancer: None,
            reranker: None,
            rerank_pool_factor: 5,
        }
    }

    pub fn with_candidate_policy(mut self, policy: CandidatePolicy) -> Self {
        self.candidates = policy;
        self
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn QueryEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_rerank_pool_factor(mut self, factor: usize) -> Self {
        self.rerank_pool_factor = factor.max(1);
        self
    }

    pub fn snapshot(&self) -> &Arc<IndexSnapshot> {
        &self.snapshot
    }

    /// `alpha · keyword + (1 − alpha) · semantic` over min-max normalized scores
    pub async fn weighted_search(&self, query: &str, alpha: f64, limit: usize) -> Result<Vec<FusedResult>> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::Validation(format!("alpha must lie in [0, 1], got {alpha}")));
        }

        let query = self.prepare_query(query).await?;
        let lists = self.gather(&query, limit).await?;
        let fused = weighted_fusion(&lists, &[alpha, 1.0 - alpha])?;

        tracing::debug!("[HYBRID] Weighted fusion (alpha {alpha}) of {} documents", fused.len());
        self.finish(&query, fused, limit).await
    }

    /// Reciprocal Rank Fusion: each signal contributes `1 / (k + rank)`
    pub async fn rrf_search(&self, query: &str, k: usize, limit: usize) -> Result<Vec<FusedResult>> {
        let query = self.prepare_query(query).await?;
        let lists = self.gather(&query, limit).await?;
        let fused = reciprocal_rank_fusion(&lists, k);

        tracing::debug!("[HYBRID] RRF (k {k}) of {} documents", fused.len());
        self.finish(&query, fused, limit).await
    }

    async fn prepare_query(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be blank".to_string()));
        }
        match &self.enhancer {
            Some(enhancer) => enhancer.enhance(query).await,
            None => Ok(query.to_string()),
        }
    }

    async fn gather(&self, query: &str, limit: usize) -> Result<Vec<Vec<Candidate>>> {
        let candidate_limit = self.candidates.candidate_limit(limit);
        let mut lists = Vec::new();
        for signal in self.snapshot.signals() {
            lists.push(signal.candidates(query, candidate_limit).await?);
        }
        Ok(lists)
    }

    fn resolve(&self, fused: Vec<Fused>, keep: usize) -> Vec<FusedResult> {
        let signals = self.snapshot.signals();
        let names: Vec<&str> = signals.iter().map(|s| s.name()).collect();

        fused
            .into_iter()
            .filter_map(|entry| {
                let document = self.snapshot.document(entry.doc_id)?.clone();
                let signals = names
                    .iter()
                    .zip(entry.hits)
                    .map(|(name, hit)| SignalScore {
                        signal: name.to_string(),
                        hit,
                    })
                    .collect();
                Some(FusedResult {
                    document,
                    signals,
                    score: entry.score,
                    rerank_score: None,
                    rerank_rank: None,
                })
            })
            .take(keep)
            .collect()
    }

    async fn finish(&self, query: &str, fused: Vec<Fused>, limit: usize) -> Result<Vec<FusedResult>> {
        let Some(reranker) = &self.reranker else {
            return Ok(self.resolve(fused, limit));
        };

        let pool = self.resolve(fused, limit.saturating_mul(self.rerank_pool_factor));
        let mut reranked = reranker.rerank(query, pool).await?;
        reranked.truncate(limit);
        Ok(reranked)
    }
}

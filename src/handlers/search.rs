//! Search handlers
//!
//! Keyword, semantic and the two hybrid fusion modes over the session snapshot

use super::{describe_fused, CommandHandlers, Output};
use crate::enhance::{self, EnhanceMethod};
use crate::evaluation::LlmJudge;
use crate::generation;
use crate::rerank::{self, RerankMethod};
use crate::retry::RetryPolicy;
use crate::{Error, Result};
use tracing::info;

#[derive(Debug, Clone, clap::Args)]
pub struct KeywordArgs {
    /// Search query
    pub query: String,
    /// Number of results to return
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SemanticArgs {
    /// Search query
    pub query: String,
    /// Number of results to return
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct WeightedArgs {
    /// Search query
    pub query: String,
    /// 1 ranks by keywords only, 0 by semantics only
    #[arg(long)]
    pub alpha: Option<f64>,
    /// Number of results to return
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct RrfArgs {
    /// Search query
    pub query: String,
    /// Rank damping constant; larger values flatten the contribution curve
    #[arg(long)]
    pub k: Option<usize>,
    /// Number of results to return
    #[arg(long)]
    pub limit: Option<usize>,
    /// Query enhancement applied before retrieval
    #[arg(long, value_enum)]
    pub enhance: Option<EnhanceMethod>,
    /// Reorder the fused results before truncation
    #[arg(long, value_enum, alias = "rerank-method")]
    pub rerank: Option<RerankMethod>,
    /// Grade every returned result 0-3 with the LLM
    #[arg(long)]
    pub evaluate: bool,
}

impl CommandHandlers {
    pub async fn handle_keyword(&self, args: KeywordArgs) -> Result<Output> {
        let KeywordArgs { query, limit } = args;
        let limit = self.limit_or_default(limit);
        if query.trim().is_empty() {
            return Err(Error::Validation("query must not be blank".to_string()));
        }

        info!("[SEARCH] Keyword query: \"{}\"", query);
        let snapshot = self.session().await?.snapshot().await;
        let results = snapshot.lexical.search(&query, limit);

        let message = if results.is_empty() {
            "No results found.".to_string()
        } else {
            results
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{}. ({}) {} - {:.4}", i + 1, r.document.id, r.document.title, r.score))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(serde_json::json!({
            "message": message,
            "query": query,
            "results": results,
        }))
    }

    pub async fn handle_semantic(&self, args: SemanticArgs) -> Result<Output> {
        let SemanticArgs { query, limit } = args;
        let limit = self.limit_or_default(limit);

        info!("[SEARCH] Semantic query: \"{}\"", query);
        let snapshot = self.session().await?.snapshot().await;
        let results = snapshot.semantic.search_chunks(&query, limit).await?;

        let message = if results.is_empty() {
            "No results found.".to_string()
        } else {
            results
                .iter()
                .enumerate()
                .map(|(i, r)| format!("{}. {} (score: {:.4})\n   {}...", i + 1, r.title, r.score, r.snippet))
                .collect::<Vec<_>>()
                .join("\n")
        };

        Ok(serde_json::json!({
            "message": message,
            "query": query,
            "results": results,
        }))
    }

    pub async fn handle_weighted(&self, args: WeightedArgs) -> Result<Output> {
        let WeightedArgs { query, alpha, limit } = args;
        let alpha = alpha.unwrap_or(self.config.search.alpha);
        let limit = self.limit_or_default(limit);

        info!("[SEARCH] Weighted query: \"{}\" (alpha {})", query, alpha);
        let search = self.session().await?.hybrid().await;
        let results = search.weighted_search(&query, alpha, limit).await?;

        Ok(serde_json::json!({
            "message": describe_fused(&results, "Hybrid Score", self.config.search.snippet_chars),
            "query": query,
            "alpha": alpha,
            "results": results,
        }))
    }

    pub async fn handle_rrf(&self, args: RrfArgs) -> Result<Output> {
        let RrfArgs {
            query,
            k,
            limit,
            enhance: enhance_method,
            rerank: rerank_method,
            evaluate,
        } = args;
        let k = k.unwrap_or(self.config.search.rrf_k);
        let limit = self.limit_or_default(limit);

        let mut search = self.session().await?.hybrid().await;
        if let Some(method) = enhance_method {
            info!("[SEARCH] Enhancing query with {}", method.as_str());
            search = search.with_enhancer(enhance::from_config(method, &self.config)?);
        }
        if let Some(method) = rerank_method {
            info!("[SEARCH] Reranking with {}", method.as_str());
            search = search.with_reranker(rerank::from_config(method, &self.config)?);
        }

        info!("[SEARCH] RRF query: \"{}\" (k {})", query, k);
        let results = search.rrf_search(&query, k, limit).await?;

        let mut message = describe_fused(&results, "RRF Score", self.config.search.snippet_chars);
        let grades = if evaluate {
            let judge = LlmJudge::new(
                generation::from_config(&self.config.generation)?,
                RetryPolicy::from(&self.config.retry),
            );
            let grades = judge.judge(&query, &results).await?;
            let report: Vec<String> = results
                .iter()
                .zip(&grades)
                .enumerate()
                .map(|(i, (r, grade))| format!("{}. {}: {}/3", i + 1, r.document.title, grade))
                .collect();
            message.push_str("\n\nLLM Evaluation:\n");
            message.push_str(&report.join("\n"));
            Some(grades)
        } else {
            None
        };

        Ok(serde_json::json!({
            "message": message,
            "query": query,
            "k": k,
            "enhance": enhance_method.map(|m| m.as_str()),
            "rerank": rerank_method.map(|m| m.as_str()),
            "results": results,
            "grades": grades,
        }))
    }
}

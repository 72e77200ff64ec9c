//! Retrieval quality against a golden dataset

use crate::corpus::{GoldenDataset, TestCase};
use crate::generation::TextGenerator;
use crate::retry::{with_retry, RetryPolicy};
use crate::search::HybridSearch;
use crate::types::FusedResult;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseReport {
    pub query: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub retrieved: Vec<String>,
    pub relevant: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub limit: usize,
    pub cases: Vec<CaseReport>,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// precision@limit, recall@limit and their harmonic mean.
/// Titles are matched exactly.
pub fn score_titles(retrieved: &[String], relevant: &[String], limit: usize) -> Result<Metrics> {
    if limit == 0 {
        return Err(Error::DegenerateInput("evaluation limit must be positive".to_string()));
    }
    if relevant.is_empty() {
        return Err(Error::DegenerateInput(
            "test case has no relevant documents".to_string(),
        ));
    }

    let relevant_set: HashSet<&str> = relevant.iter().map(String::as_str).collect();
    let retrieved_set: HashSet<&str> = retrieved.iter().take(limit).map(String::as_str).collect();
    let hits = retrieved_set.intersection(&relevant_set).count() as f64;

    let precision = hits / limit as f64;
    let recall = hits / relevant_set.len() as f64;
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(Metrics {
        precision,
        recall,
        f1,
    })
}

pub struct Evaluator {
    search: HybridSearch,
    rrf_k: usize,
}

impl Evaluator {
    pub fn new(search: HybridSearch, rrf_k: usize) -> Self {
        Self { search, rrf_k }
    }

    pub async fn evaluate_case(&self, case: &TestCase, limit: usize) -> Result<CaseReport> {
        if limit == 0 {
            return Err(Error::DegenerateInput("evaluation limit must be positive".to_string()));
        }
        if case.relevant_docs.is_empty() {
            return Err(Error::DegenerateInput(format!(
                "test case '{}' has no relevant documents",
                case.query
            )));
        }

        let results = self.search.rrf_search(&case.query, self.rrf_k, limit).await?;
        let retrieved: Vec<String> = results.into_iter().map(|r| r.document.title).collect();
        let metrics = score_titles(&retrieved, &case.relevant_docs, limit)?;

        Ok(CaseReport {
            query: case.query.clone(),
            precision: metrics.precision,
            recall: metrics.recall,
            f1: metrics.f1,
            retrieved,
            relevant: case.relevant_docs.clone(),
        })
    }

    pub async fn evaluate(&self, dataset: &GoldenDataset, limit: usize) -> Result<EvaluationReport> {
        let mut cases = Vec::with_capacity(dataset.test_cases.len());
        for case in &dataset.test_cases {
            let report = self.evaluate_case(case, limit).await?;
            tracing::info!(
                "[EVAL] '{}': precision {:.4} recall {:.4} f1 {:.4}",
                report.query,
                report.precision,
                report.recall,
                report.f1
            );
            cases.push(report);
        }

        let mean = |f: fn(&CaseReport) -> f64| {
            if cases.is_empty() {
                0.0
            } else {
                cases.iter().map(f).sum::<f64>() / cases.len() as f64
            }
        };
        let mean_precision = mean(|c| c.precision);
        let mean_recall = mean(|c| c.recall);
        let mean_f1 = mean(|c| c.f1);

        Ok(EvaluationReport {
            limit,
            mean_precision,
            mean_recall,
            mean_f1,
            cases,
        })
    }
}

/// Asks an LLM to grade each result 0-3 for relevance to the query
pub struct LlmJudge {
    generator: Arc<dyn TextGenerator>,
    retry: RetryPolicy,
}

impl LlmJudge {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryPolicy) -> Self {
        Self { generator, retry }
    }

    fn prompt(query: &str, results: &[FusedResult]) -> String {
        let listing: Vec<String> = results
            .iter()
            .map(|r| format!("{} - {}", r.document.title, r.document.description))
            .collect();
        format!(
            "Rate how relevant each result is to this query on a 0-3 scale:\n\
             - 3: Highly relevant\n\
             - 2: Relevant\n\
             - 1: Marginally relevant\n\
             - 0: Not relevant\n\n\
             Do NOT give any numbers out other than 0, 1, 2, or 3.\n\n\
             Query: \"{query}\"\n\n\
             Results:\n{}\n\n\
             Return ONLY the scores in the same order you were given the documents. \
             Return a valid JSON list, nothing else. For example:\n\n\
             [2, 0, 3, 2, 0, 1]",
            listing.join("\n")
        )
    }

    /// One grade per result, in result order
    pub async fn judge(&self, query: &str, results: &[FusedResult]) -> Result<Vec<u8>> {
        if results.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = Self::prompt(query, results);
        let response = with_retry(&self.retry, "evaluate results", || {
            self.generator.complete(&prompt)
        })
        .await?;

        let text = response.trim().trim_start_matches("```json").trim_matches('`').trim();
        let grades: Vec<u8> = serde_json::from_str(text).map_err(|e| {
            Error::ExternalService(format!("failed to parse relevance grades '{text}': {e}"))
        })?;
        if grades.len() != results.len() || grades.iter().any(|g| *g > 3) {
            return Err(Error::ExternalService(format!(
                "expected {} grades between 0 and 3, got {grades:?}",
                results.len()
            )));
        }
        Ok(grades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingProvider, HashEmbedding};
    use crate::search::{Bm25Params, IndexSnapshot, LexicalIndex, SemanticIndex, SemanticParams};
    use crate::tokenizer::TextTokenizer;
    use crate::types::Document;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_metrics() {
        let m = score_titles(
            &titles(&["Paddington", "Jaws", "Brave"]),
            &titles(&["Paddington", "The Revenant"]),
            3,
        )
        .unwrap();
        assert!((m.precision - 1.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 0.5).abs() < 1e-12);
        assert!((m.f1 - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_precision_divides_by_limit() {
        // fewer results than the limit still count against precision
        let m = score_titles(&titles(&["Jaws"]), &titles(&["Jaws"]), 5).unwrap();
        assert!((m.precision - 0.2).abs() < 1e-12);
        assert_eq!(m.recall, 1.0);
    }

    #[test]
    fn test_duplicate_titles_count_once() {
        let m = score_titles(&titles(&["Jaws", "Jaws"]), &titles(&["Jaws", "Jaws"]), 2).unwrap();
        assert!((m.precision - 0.5).abs() < 1e-12);
        assert_eq!(m.recall, 1.0);
    }

    #[test]
    fn test_no_hits_gives_zero_f1() {
        let m = score_titles(&titles(&["Jaws"]), &titles(&["Brave"]), 1).unwrap();
        assert_eq!(m.f1, 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(matches!(
            score_titles(&titles(&["Jaws"]), &[], 5),
            Err(Error::DegenerateInput(_))
        ));
        assert!(matches!(
            score_titles(&titles(&["Jaws"]), &titles(&["Jaws"]), 0),
            Err(Error::DegenerateInput(_))
        ));
    }

    #[tokio::test]
    async fn test_llm_judge_grades() {
        use crate::enhance::tests::{fast_retry, ScriptedGenerator};

        let results: Vec<FusedResult> = ["Jaws", "Brave"]
            .iter()
            .enumerate()
            .map(|(i, title)| FusedResult {
                document: Document::new(i as u64, *title, "plot"),
                signals: Vec::new(),
                score: 0.0,
                rerank_score: None,
                rerank_rank: None,
            })
            .collect();

        let judge = LlmJudge::new(Arc::new(ScriptedGenerator::replying(&["[3, 0]"])), fast_retry());
        assert_eq!(judge.judge("shark", &results).await.unwrap(), vec![3, 0]);

        let judge = LlmJudge::new(Arc::new(ScriptedGenerator::replying(&["[3, 7]"])), fast_retry());
        assert!(matches!(
            judge.judge("shark", &results).await,
            Err(Error::ExternalService(_))
        ));
    }

    #[tokio::test]
    async fn test_evaluate_dataset() {
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
        let search = HybridSearch::new(Arc::new(IndexSnapshot::new(lexical, semantic)));
        let evaluator = Evaluator::new(search, 60);

        let dataset = GoldenDataset {
            test_cases: vec![TestCase {
                query: "shark".to_string(),
                relevant_docs: titles(&["Jaws"]),
            }],
        };
        let report = evaluator.evaluate(&dataset, 1).await.unwrap();
        assert_eq!(report.cases[0].retrieved, titles(&["Jaws"]));
        assert_eq!(report.mean_precision, 1.0);
        assert_eq!(report.mean_f1, 1.0);

        let empty = GoldenDataset {
            test_cases: vec![TestCase {
                query: "shark".to_string(),
                relevant_docs: Vec::new(),
            }],
        };
        assert!(matches!(
            evaluator.evaluate(&empty, 1).await,
            Err(Error::DegenerateInput(_))
        ));
    }
}

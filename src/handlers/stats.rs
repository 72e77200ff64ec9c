//! Term statistics handler
//!
//! Exposes the individual BM25 and TF-IDF quantities for a single term

use super::{CommandHandlers, Output};
use crate::types::DocId;
use crate::{Error, Result};

#[derive(Debug, Clone, clap::Args)]
pub struct TermStatsArgs {
    /// A single term; it must normalize to exactly one token
    pub term: String,
    /// Document for the per-document statistics (tf, tf-idf, bm25)
    #[arg(long)]
    pub doc_id: Option<DocId>,
    /// How many matching document ids to list
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

impl CommandHandlers {
    pub async fn handle_term_stats(&self, args: TermStatsArgs) -> Result<Output> {
        let TermStatsArgs { term, doc_id, limit } = args;
        let snapshot = self.session().await?.snapshot().await;
        let index = &snapshot.lexical;

        let documents = index.documents_for(&term)?;
        let idf = index.idf(&term)?;
        let bm25_idf = index.bm25_idf(&term)?;

        let mut lines = vec![
            format!("Term: {term}"),
            format!("Documents containing term: {}", documents.len()),
            format!("IDF: {idf:.4}"),
            format!("BM25 IDF: {bm25_idf:.4}"),
        ];
        let shown: Vec<DocId> = documents.iter().copied().take(limit).collect();
        if !shown.is_empty() {
            let ids: Vec<String> = shown.iter().map(|id| id.to_string()).collect();
            lines.push(format!("First ids: {}", ids.join(", ")));
        }

        let per_document = match doc_id {
            Some(doc_id) => {
                let document = index
                    .document(doc_id)
                    .ok_or_else(|| Error::Validation(format!("unknown document id {doc_id}")))?;
                let tf = index.term_frequency(doc_id, &term)?;
                let tfidf = index.tfidf(doc_id, &term)?;
                let bm25_tf = index.bm25_tf(doc_id, &term)?;
                let bm25 = index.bm25(doc_id, &term)?;

                lines.push(format!("Document {doc_id}: {}", document.title));
                lines.push(format!("  TF: {tf}"));
                lines.push(format!("  TF-IDF: {tfidf:.4}"));
                lines.push(format!("  BM25 TF: {bm25_tf:.4}"));
                lines.push(format!("  BM25: {bm25:.4}"));

                Some(serde_json::json!({
                    "doc_id": doc_id,
                    "tf": tf,
                    "tfidf": tfidf,
                    "bm25_tf": bm25_tf,
                    "bm25": bm25,
                }))
            }
            None => None,
        };

        Ok(serde_json::json!({
            "message": lines.join("\n"),
            "term": term,
            "document_frequency": documents.len(),
            "documents": shown,
            "idf": idf,
            "bm25_idf": bm25_idf,
            "document": per_document,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::offline_config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_term_stats_for_bear() {
        let dir = tempdir().unwrap();
        let handlers = CommandHandlers::new(offline_config(dir.path()));

        let output = handlers
            .handle_term_stats(TermStatsArgs {
                term: "bears".to_string(),
                doc_id: Some(1),
                limit: 10,
            })
            .await
            .unwrap();
        assert_eq!(output["documents"], serde_json::json!([1, 2]));
        // ln((3 - 2 + 0.5) / (2 + 0.5) + 1) = ln(1.6)
        let bm25_idf = output["bm25_idf"].as_f64().unwrap();
        assert!((bm25_idf - 1.6f64.ln()).abs() < 1e-9);
        assert_eq!(output["document"]["tf"], 1);
    }

    #[tokio::test]
    async fn test_term_stats_rejects_phrases_and_unknown_docs() {
        let dir = tempdir().unwrap();
        let handlers = CommandHandlers::new(offline_config(dir.path()));

        let phrase = handlers
            .handle_term_stats(TermStatsArgs {
                term: "grizzly bear".to_string(),
                doc_id: None,
                limit: 10,
            })
            .await;
        assert!(matches!(phrase, Err(Error::Validation(_))));

        let unknown = handlers
            .handle_term_stats(TermStatsArgs {
                term: "bear".to_string(),
                doc_id: Some(99),
                limit: 10,
            })
            .await;
        assert!(matches!(unknown, Err(Error::Validation(_))));
    }
}

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub type DocId = u64;

/// A corpus entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub title: String,
    pub description: String,
}

impl Document {
    pub fn new(id: DocId, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Text fed to the lexical index: title and description joined by a space
    pub fn indexed_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// First `max_chars` characters of the description
    pub fn snippet(&self, max_chars: usize) -> String {
        self.description.chars().take(max_chars).collect()
    }
}

/// A contiguous span of a document used as the embedding unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source_doc_index: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
}

/// Per-chunk sidecar record persisted next to the embedding matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_index: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl From<&Chunk> for ChunkMetadata {
    fn from(chunk: &Chunk) -> Self {
        Self {
            doc_index: chunk.source_doc_index,
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
        }
    }
}

/// One entry of a ranking signal's ordered output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub doc_id: DocId,
    /// 1-based position within the signal's list
    pub rank: usize,
    pub score: f64,
}

/// Keyword search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

/// Semantic search result, one per document after chunk aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SemanticHit {
    pub id: DocId,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

/// How a document placed within one ranking signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalHit {
    pub rank: usize,
    pub raw_score: f64,
    /// Min-max normalized score (weighted fusion) or RRF contribution
    pub fused_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalScore {
    pub signal: String,
    pub hit: Option<SignalHit>,
}

/// Hybrid search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedResult {
    pub document: Document,
    pub signals: Vec<SignalScore>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_rank: Option<usize>,
}

impl FusedResult {
    pub fn signal(&self, name: &str) -> Option<&SignalHit> {
        self.signals
            .iter()
            .find(|s| s.signal == name)
            .and_then(|s| s.hit.as_ref())
    }

    pub fn rank_in(&self, name: &str) -> Option<usize> {
        self.signal(name).map(|hit| hit.rank)
    }
}

/// Descending by score, ascending by document id on ties
pub fn by_score_then_id(a: (f64, DocId), b: (f64, DocId)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_text_and_snippet() {
        let doc = Document::new(1, "Paddington", "A bear in London");
        assert_eq!(doc.indexed_text(), "Paddington A bear in London");
        assert_eq!(doc.snippet(6), "A bear");
        assert_eq!(doc.snippet(500), "A bear in London");
    }

    #[test]
    fn test_tie_break_orders_by_id() {
        let mut items = vec![(1.0, 9), (2.0, 5), (1.0, 3)];
        items.sort_by(|a, b| by_score_then_id(*a, *b));
        assert_eq!(items, vec![(2.0, 5), (1.0, 3), (1.0, 9)]);
    }
}

pub mod bm25;
pub mod fusion;
pub mod hybrid;
pub mod semantic;

pub use bm25::{Bm25Params, LexicalIndex};
pub use fusion::{normalize, normalize_scores, reciprocal_rank_fusion, weighted_fusion, Fused};
pub use hybrid::{CandidatePolicy, HybridSearch};
pub use semantic::{cosine_similarity, ChunkAggregation, SemanticIndex, SemanticParams};

use crate::types::{Candidate, DocId, Document};
use crate::Result;
use async_trait::async_trait;

pub const KEYWORD_SIGNAL: &str = "keyword";
pub const SEMANTIC_SIGNAL: &str = "semantic";

/// Anything that turns a query into an ordered candidate list
#[async_trait]
pub trait RankingSignal: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` candidates, best first, ranks starting at 1
    async fn candidates(&self, query: &str, limit: usize) -> Result<Vec<Candidate>>;
}

/// Immutable pair of indices built from one corpus
pub struct IndexSnapshot {
    pub lexical: LexicalIndex,
    pub semantic: SemanticIndex,
}

impl IndexSnapshot {
    pub fn new(lexical: LexicalIndex, semantic: SemanticIndex) -> Self {
        Self { lexical, semantic }
    }

    /// Signals in fusion order; weighted fusion pairs them with `[alpha, 1 - alpha]`
    pub fn signals(&self) -> [&dyn RankingSignal; 2] {
        [&self.lexical, &self.semantic]
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.lexical.document(id)
    }

    pub fn len(&self) -> usize {
        self.lexical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lexical.is_empty()
    }
}

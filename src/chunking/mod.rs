pub mod splitter;

pub use splitter::{chunk_fixed, chunk_sentences, split_sentences, FixedSplitter, SentenceSplitter};

use crate::types::Chunk;
use crate::Result;

/// Sentence-window parameters used when preparing documents for embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub max_sentences: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_sentences: 4,
            overlap: 1,
        }
    }
}

impl From<&crate::config::ChunkingConfig> for ChunkParams {
    fn from(config: &crate::config::ChunkingConfig) -> Self {
        Self {
            max_sentences: config.max_sentences,
            overlap: config.sentence_overlap,
        }
    }
}

/// Sentence-chunks `text` and tags every piece with its position in the document
pub fn chunk_document(doc_index: usize, text: &str, params: ChunkParams) -> Result<Vec<Chunk>> {
    let pieces = chunk_sentences(text, params.max_sentences, params.overlap)?;
    let total_chunks = pieces.len();

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            source_doc_index: doc_index,
            chunk_index,
            total_chunks,
            text,
        })
        .collect())
}

//! BM25 keyword search over an in-memory inverted index

use super::{RankingSignal, KEYWORD_SIGNAL};
use crate::cache;
use crate::config::{CachePolicy, SearchConfig};
use crate::tokenizer::Tokenizer;
use crate::types::{by_score_then_id, Candidate, DocId, Document, ScoredDocument};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

const INDEX_FILE: &str = "index.bin";
const DOCMAP_FILE: &str = "docmap.bin";
const TERM_FREQUENCIES_FILE: &str = "term_frequencies.bin";
const DOC_LENGTHS_FILE: &str = "doc_lengths.bin";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

impl From<&SearchConfig> for Bm25Params {
    fn from(config: &SearchConfig) -> Self {
        Self {
            k1: config.bm25_k1,
            b: config.bm25_b,
        }
    }
}

pub struct LexicalIndex {
    tokenizer: Arc<dyn Tokenizer>,
    params: Bm25Params,
    /// token -> ids of the documents containing it
    index: BTreeMap<String, BTreeSet<DocId>>,
    docmap: BTreeMap<DocId, Document>,
    term_frequencies: BTreeMap<DocId, BTreeMap<String, u32>>,
    doc_lengths: BTreeMap<DocId, usize>,
}

impl LexicalIndex {
    pub fn build(
        documents: &[Document],
        tokenizer: Arc<dyn Tokenizer>,
        params: Bm25Params,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::DegenerateInput(
                "cannot build a keyword index from an empty corpus".to_string(),
            ));
        }

        let mut index = Self {
            tokenizer,
            params,
            index: BTreeMap::new(),
            docmap: BTreeMap::new(),
            term_frequencies: BTreeMap::new(),
            doc_lengths: BTreeMap::new(),
        };

        for doc in documents {
            if index.docmap.contains_key(&doc.id) {
                return Err(Error::Validation(format!("duplicate document id {}", doc.id)));
            }
            index.add_document(doc);
        }

        tracing::info!(
            "[KEYWORD] Indexed {} documents, {} distinct tokens",
            index.docmap.len(),
            index.index.len()
        );

        Ok(index)
    }

    fn add_document(&mut self, doc: &Document) {
        let tokens = self.tokenizer.tokenize(&doc.indexed_text());

        let frequencies = self.term_frequencies.entry(doc.id).or_default();
        for token in &tokens {
            *frequencies.entry(token.clone()).or_insert(0) += 1;
            self.index.entry(token.clone()).or_default().insert(doc.id);
        }

        self.doc_lengths.insert(doc.id, tokens.len());
        self.docmap.insert(doc.id, doc.clone());
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn len(&self) -> usize {
        self.docmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docmap.is_empty()
    }

    pub fn document(&self, id: DocId) -> Option<&Document> {
        self.docmap.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docmap.values()
    }

    /// Normalizes `term` and requires it to yield exactly one token
    fn single_token(&self, term: &str) -> Result<String> {
        let mut tokens = self.tokenizer.tokenize(term);
        match tokens.len() {
            1 => Ok(tokens.remove(0)),
            0 => Err(Error::Validation(format!("term '{term}' produced no tokens"))),
            n => Err(Error::Validation(format!(
                "term '{term}' must be a single token, got {n}"
            ))),
        }
    }

    fn document_frequency(&self, token: &str) -> usize {
        self.index.get(token).map_or(0, BTreeSet::len)
    }

    fn raw_term_frequency(&self, doc_id: DocId, token: &str) -> u32 {
        self.term_frequencies
            .get(&doc_id)
            .and_then(|tf| tf.get(token))
            .copied()
            .unwrap_or(0)
    }

    pub fn avg_doc_length(&self) -> f64 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        let total: usize = self.doc_lengths.values().sum();
        total as f64 / self.doc_lengths.len() as f64
    }

    /// Sorted ids of the documents containing `term`
    pub fn documents_for(&self, term: &str) -> Result<Vec<DocId>> {
        let token = self.single_token(term)?;
        Ok(self
            .index
            .get(&token)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    pub fn term_frequency(&self, doc_id: DocId, term: &str) -> Result<u32> {
        let token = self.single_token(term)?;
        Ok(self.raw_term_frequency(doc_id, &token))
    }

    pub fn idf(&self, term: &str) -> Result<f64> {
        let token = self.single_token(term)?;
        let n = self.docmap.len() as f64;
        let df = self.document_frequency(&token) as f64;
        Ok(((n + 1.0) / (df + 1.0)).ln())
    }

    pub fn tfidf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let tf = self.term_frequency(doc_id, term)? as f64;
        Ok(tf * self.idf(term)?)
    }

    pub fn bm25_idf(&self, term: &str) -> Result<f64> {
        let token = self.single_token(term)?;
        Ok(self.token_bm25_idf(&token))
    }

    pub fn bm25_tf(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let token = self.single_token(term)?;
        Ok(self.token_bm25_tf(doc_id, &token, self.avg_doc_length()))
    }

    pub fn bm25(&self, doc_id: DocId, term: &str) -> Result<f64> {
        let token = self.single_token(term)?;
        Ok(self.token_bm25(doc_id, &token, self.avg_doc_length()))
    }

    fn token_bm25_idf(&self, token: &str) -> f64 {
        let n = self.docmap.len() as f64;
        let df = self.document_frequency(token) as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    fn token_bm25_tf(&self, doc_id: DocId, token: &str, avg_doc_length: f64) -> f64 {
        let tf = self.raw_term_frequency(doc_id, token) as f64;
        if tf == 0.0 || avg_doc_length == 0.0 {
            return 0.0;
        }

        let doc_length = self.doc_lengths.get(&doc_id).copied().unwrap_or(0) as f64;
        let Bm25Params { k1, b } = self.params;
        let length_norm = 1.0 - b + b * (doc_length / avg_doc_length);

        (tf * (k1 + 1.0)) / (tf + k1 * length_norm)
    }

    fn token_bm25(&self, doc_id: DocId, token: &str, avg_doc_length: f64) -> f64 {
        self.token_bm25_tf(doc_id, token, avg_doc_length) * self.token_bm25_idf(token)
    }

    /// Ranked keyword query; ties are broken by ascending document id
    pub fn search(&self, query: &str, limit: usize) -> Vec<ScoredDocument> {
        self.ranked_ids(query, limit)
            .into_iter()
            .filter_map(|(id, score)| {
                self.docmap.get(&id).map(|doc| ScoredDocument {
                    document: doc.clone(),
                    score,
                })
            })
            .collect()
    }

    fn ranked_ids(&self, query: &str, limit: usize) -> Vec<(DocId, f64)> {
        if limit == 0 {
            return Vec::new();
        }

        let tokens: BTreeSet<String> = self.tokenizer.tokenize(query).into_iter().collect();
        let avg_doc_length = self.avg_doc_length();

        let mut scores: BTreeMap<DocId, f64> = BTreeMap::new();
        for token in &tokens {
            let Some(postings) = self.index.get(token) else {
                continue;
            };
            for &doc_id in postings {
                *scores.entry(doc_id).or_insert(0.0) +=
                    self.token_bm25(doc_id, token, avg_doc_length);
            }
        }

        let mut ranked: Vec<(DocId, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| by_score_then_id((a.1, a.0), (b.1, b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        cache::write_all(
            dir,
            &[
                (INDEX_FILE, cache::encode(&self.index)?),
                (DOCMAP_FILE, cache::encode(&self.docmap)?),
                (TERM_FREQUENCIES_FILE, cache::encode(&self.term_frequencies)?),
                (DOC_LENGTHS_FILE, cache::encode(&self.doc_lengths)?),
            ],
        )?;

        tracing::info!("[KEYWORD] Saved index to {}", dir.display());
        Ok(())
    }

    /// Loads a persisted index; any absent or undecodable artifact is a `MissingCache`
    pub fn load(dir: &Path, tokenizer: Arc<dyn Tokenizer>, params: Bm25Params) -> Result<Self> {
        let index = Self {
            tokenizer,
            params,
            index: cache::read_bincode(dir, INDEX_FILE)?,
            docmap: cache::read_bincode(dir, DOCMAP_FILE)?,
            term_frequencies: cache::read_bincode(dir, TERM_FREQUENCIES_FILE)?,
            doc_lengths: cache::read_bincode(dir, DOC_LENGTHS_FILE)?,
        };

        tracing::info!(
            "[KEYWORD] Loaded index with {} documents from {}",
            index.docmap.len(),
            dir.display()
        );
        Ok(index)
    }

    pub fn load_or_build(
        dir: &Path,
        documents: &[Document],
        tokenizer: Arc<dyn Tokenizer>,
        params: Bm25Params,
        policy: CachePolicy,
    ) -> Result<Self> {
        let reason = match Self::load(dir, tokenizer.clone(), params) {
            Ok(index) if index.len() == documents.len() => return Ok(index),
            Ok(index) => format!(
                "keyword cache holds {} documents, corpus has {}",
                index.len(),
                documents.len()
            ),
            Err(e) => e.to_string(),
        };

        match policy {
            CachePolicy::Require => Err(Error::MissingCache(reason)),
            CachePolicy::Rebuild => {
                tracing::info!("[KEYWORD] Rebuilding index: {reason}");
                let index = Self::build(documents, tokenizer, params)?;
                index.save(dir)?;
                Ok(index)
            }
        }
    }
}

#[async_trait]
impl RankingSignal for LexicalIndex {
    fn name(&self) -> &str {
        KEYWORD_SIGNAL
    }

    async fn candidates(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        Ok(self
            .ranked_ids(query, limit)
            .into_iter()
            .enumerate()
            .map(|(i, (doc_id, score))| Candidate {
                doc_id,
                rank: i + 1,
                score,
            })
            .collect())
    }
}

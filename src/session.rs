//! Build-or-load-once search session
//!
//! Readers clone the current `Arc<IndexSnapshot>` and search without holding
//! the lock. `rebuild` constructs a complete new snapshot before swapping it in,
//! so a published snapshot is never mutated.

use crate::config::Config;
use crate::corpus;
use crate::embeddings::{self, EmbeddingProvider};
use crate::search::{
    Bm25Params, CandidatePolicy, HybridSearch, IndexSnapshot, LexicalIndex, SemanticIndex,
    SemanticParams,
};
use crate::tokenizer::{TextTokenizer, Tokenizer};
use crate::types::Document;
use crate::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct SearchSession {
    config: Config,
    tokenizer: Arc<dyn Tokenizer>,
    provider: Arc<dyn EmbeddingProvider>,
    snapshot: RwLock<Arc<IndexSnapshot>>,
}

type Parts = (Vec<Document>, Arc<dyn Tokenizer>, Arc<dyn EmbeddingProvider>);

/// Loads the corpus, tokenizer and embedding provider named by `config`
async fn load_parts(config: &Config) -> Result<Parts> {
    let documents = corpus::load_documents(&config.storage.corpus_path)?;
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(TextTokenizer::from_optional_file(
        config.storage.stopwords_path.as_deref(),
    )?);
    let provider = embeddings::from_config(&config.embedding).await?;
    Ok((documents, tokenizer, provider))
}

/// Builds both indices from scratch and persists them
async fn build_snapshot(
    config: &Config,
    documents: &[Document],
    tokenizer: &Arc<dyn Tokenizer>,
    provider: &Arc<dyn EmbeddingProvider>,
) -> Result<IndexSnapshot> {
    let lexical = LexicalIndex::build(documents, tokenizer.clone(), Bm25Params::from(&config.search))?;
    let semantic =
        SemanticIndex::build(documents, provider.clone(), SemanticParams::from(config)).await?;

    lexical.save(&config.storage.keyword_cache_dir())?;
    semantic.save(&config.storage.semantic_cache_dir())?;

    Ok(IndexSnapshot::new(lexical, semantic))
}

impl SearchSession {
    /// Opens a session over the configured corpus, honoring the cache policy
    pub async fn from_config(config: Config) -> Result<Self> {
        let (documents, tokenizer, provider) = load_parts(&config).await?;
        Self::open(config, &documents, tokenizer, provider).await
    }

    /// Like [`SearchSession::from_config`] but ignores any persisted indices
    pub async fn build_from_config(config: Config) -> Result<Self> {
        let (documents, tokenizer, provider) = load_parts(&config).await?;
        Self::create(config, &documents, tokenizer, provider).await
    }

    /// Reuses persisted indices where the cache policy allows, building otherwise
    pub async fn open(
        config: Config,
        documents: &[Document],
        tokenizer: Arc<dyn Tokenizer>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let policy = config.storage.cache_policy;

        let lexical = LexicalIndex::load_or_build(
            &config.storage.keyword_cache_dir(),
            documents,
            tokenizer.clone(),
            Bm25Params::from(&config.search),
            policy,
        )?;
        let semantic = SemanticIndex::load_or_build(
            &config.storage.semantic_cache_dir(),
            documents,
            provider.clone(),
            SemanticParams::from(&config),
            policy,
        )
        .await?;

        tracing::info!("[SESSION] Opened session over {} documents", lexical.len());

        Ok(Self {
            config,
            tokenizer,
            provider,
            snapshot: RwLock::new(Arc::new(IndexSnapshot::new(lexical, semantic))),
        })
    }

    /// Builds and persists fresh indices without consulting the cache
    pub async fn create(
        config: Config,
        documents: &[Document],
        tokenizer: Arc<dyn Tokenizer>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let snapshot = build_snapshot(&config, documents, &tokenizer, &provider).await?;
        tracing::info!("[SESSION] Built indices over {} documents", snapshot.len());

        Ok(Self {
            config,
            tokenizer,
            provider,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub async fn snapshot(&self) -> Arc<IndexSnapshot> {
        self.snapshot.read().await.clone()
    }

    /// Builds and persists fresh indices for `documents`, then publishes them
    pub async fn rebuild(&self, documents: &[Document]) -> Result<Arc<IndexSnapshot>> {
        let fresh = Arc::new(
            build_snapshot(&self.config, documents, &self.tokenizer, &self.provider).await?,
        );
        *self.snapshot.write().await = fresh.clone();

        tracing::info!("[SESSION] Rebuilt indices over {} documents", fresh.len());
        Ok(fresh)
    }

    /// A fusion engine over the current snapshot with the configured candidate policy
    pub async fn hybrid(&self) -> HybridSearch {
        HybridSearch::new(self.snapshot().await)
            .with_candidate_policy(CandidatePolicy::from(&self.config.search))
            .with_rerank_pool_factor(self.config.search.rerank_pool_factor)
    }
}

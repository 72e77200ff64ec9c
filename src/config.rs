use crate::search::semantic::ChunkAggregation;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Embedding provider configuration
    pub embedding: EmbeddingConfig,

    /// Text generation (enhance, rerank, answer synthesis)
    pub generation: GenerationConfig,

    /// Cross-encoder rerank service
    pub cross_encoder: CrossEncoderConfig,

    /// Storage paths
    pub storage: StorageConfig,

    /// Search configuration
    pub search: SearchConfig,

    /// Chunking configuration
    pub chunking: ChunkingConfig,

    /// Retry policy for external calls
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    /// Only used by the hashing provider
    pub dimension: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    OpenAI,
    Ollama,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    OpenAI,
    Ollama,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossEncoderConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub corpus_path: PathBuf,
    pub golden_dataset_path: PathBuf,
    pub stopwords_path: Option<PathBuf>,
    pub cache_policy: CachePolicy,
}

/// What to do when a persisted index is absent, unreadable or stale.
/// Applies to the keyword and semantic caches alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    #[default]
    Rebuild,
    Require,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub rrf_k: usize,
    pub alpha: f64,
    pub bm25_k1: f64,
    pub bm25_b: f64,
    pub candidate_multiplier: usize,
    pub candidate_floor: usize,
    pub rerank_pool_factor: usize,
    pub snippet_chars: usize,
    pub aggregation: ChunkAggregation,
    /// Chunks averaged per document under `top_k_mean` aggregation
    pub aggregation_top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub max_sentences: usize,
    pub sentence_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            cross_encoder: CrossEncoderConfig::default(),
            storage: StorageConfig::default(),
            search: SearchConfig::default(),
            chunking: ChunkingConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::OpenAI,
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            dimension: 384,
            batch_size: 16,
            timeout_secs: 60,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::OpenAI,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::rooted_at(PathBuf::from("./data"))
    }
}

impl StorageConfig {
    fn rooted_at(data_dir: PathBuf) -> Self {
        Self {
            cache_dir: data_dir.join("cache"),
            corpus_path: data_dir.join("movies.json"),
            golden_dataset_path: data_dir.join("golden_dataset.json"),
            stopwords_path: None,
            cache_policy: CachePolicy::Rebuild,
            data_dir,
        }
    }

    pub fn keyword_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("keyword")
    }

    pub fn semantic_cache_dir(&self) -> PathBuf {
        self.cache_dir.join("semantic")
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            rrf_k: 60,
            alpha: 0.5,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            candidate_multiplier: 20,
            candidate_floor: 200,
            rerank_pool_factor: 5,
            snippet_chars: 200,
            aggregation: ChunkAggregation::Max,
            aggregation_top_k: 3,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_sentences: 4,
            sentence_overlap: 1,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_secs: 10,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Layered load: defaults, then an optional config file, then
    /// `HOOPLA_*` variables (`HOOPLA_SEARCH__RRF_K=30`), then the
    /// well-known provider variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let mut config: Config = builder
            .add_source(
                config::Environment::with_prefix("HOOPLA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.apply_well_known_env();
        config.validate()?;

        Ok(config)
    }

    fn apply_well_known_env(&mut self) {
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = match provider.to_lowercase().as_str() {
                "ollama" => EmbeddingProvider::Ollama,
                "hash" => EmbeddingProvider::Hash,
                _ => EmbeddingProvider::OpenAI,
            };
        }

        if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
            if self.embedding.api_key.is_none() {
                self.embedding.api_key = Some(api_key.clone());
            }
            if self.generation.api_key.is_none() {
                self.generation.api_key = Some(api_key);
            }
        }

        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        if let Ok(base_url) = std::env::var("EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(base_url);
        }

        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            let stopwords_path = self.storage.stopwords_path.take();
            let cache_policy = self.storage.cache_policy;
            self.storage = StorageConfig::rooted_at(PathBuf::from(data_dir));
            self.storage.stopwords_path = stopwords_path;
            self.storage.cache_policy = cache_policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.search.alpha) {
            return Err(crate::Error::Config(format!(
                "search.alpha must lie in [0, 1], got {}",
                self.search.alpha
            )));
        }
        if self.search.candidate_multiplier == 0 {
            return Err(crate::Error::Config(
                "search.candidate_multiplier must be positive".to_string(),
            ));
        }
        if self.chunking.max_sentences == 0
            || self.chunking.sentence_overlap >= self.chunking.max_sentences
        {
            return Err(crate::Error::Config(format!(
                "chunking.sentence_overlap ({}) must be smaller than chunking.max_sentences ({})",
                self.chunking.sentence_overlap, self.chunking.max_sentences
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(crate::Error::Config(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

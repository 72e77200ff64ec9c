//! Build handler
//!
//! Rebuilds both indices from the corpus and persists them

use super::{CommandHandlers, Output};
use crate::corpus;
use crate::session::SearchSession;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct BuildArgs {}

impl CommandHandlers {
    pub async fn handle_build(&self, _args: BuildArgs) -> Result<Output> {
        info!("[BUILD] Building indices from {}", self.config.storage.corpus_path.display());

        let snapshot = match self.session.get() {
            Some(session) => {
                let documents = corpus::load_documents(&self.config.storage.corpus_path)?;
                session.rebuild(&documents).await?
            }
            None => {
                let session = Arc::new(SearchSession::build_from_config(self.config.clone()).await?);
                let snapshot = session.snapshot().await;
                if self.session.set(session).is_err() {
                    debug!("[BUILD] Session already opened concurrently, keeping it");
                }
                snapshot
            }
        };

        let semantic = &snapshot.semantic;
        info!(
            "[BUILD] Indexed {} documents into {} chunks",
            snapshot.len(),
            semantic.chunk_count()
        );

        Ok(serde_json::json!({
            "message": format!(
                "Built indices over {} documents ({} chunks, dimension {})\nCache: {}",
                snapshot.len(),
                semantic.chunk_count(),
                semantic.dimension(),
                self.config.storage.cache_dir.display()
            ),
            "documents": snapshot.len(),
            "chunks": semantic.chunk_count(),
            "dimension": semantic.dimension(),
            "built_at": semantic.built_at(),
            "cache_dir": self.config.storage.cache_dir,
        }))
    }
}

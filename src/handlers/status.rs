//! Index status handler
//!
//! Reports what the persisted caches hold without building anything

use super::{CommandHandlers, Output};
use crate::config::CachePolicy;
use crate::session::SearchSession;
use crate::{Error, Result};

#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {}

impl CommandHandlers {
    pub async fn handle_status(&self, _args: StatusArgs) -> Result<Output> {
        let mut strict = self.config.clone();
        strict.storage.cache_policy = CachePolicy::Require;

        match SearchSession::from_config(strict).await {
            Ok(session) => {
                let snapshot = session.snapshot().await;
                let semantic = &snapshot.semantic;
                Ok(serde_json::json!({
                    "message": format!(
                        "Indices are built and ready for search.\nStatistics: {} documents, {} chunks, dimension {}\nLast built: {}",
                        snapshot.len(),
                        semantic.chunk_count(),
                        semantic.dimension(),
                        semantic.built_at()
                    ),
                    "indexed": true,
                    "documents": snapshot.len(),
                    "chunks": semantic.chunk_count(),
                    "dimension": semantic.dimension(),
                    "built_at": semantic.built_at(),
                }))
            }
            Err(Error::MissingCache(reason)) => Ok(serde_json::json!({
                "message": format!(
                    "Indices are not built or out of date ({reason}). Run the build command first."
                ),
                "indexed": false,
                "reason": reason,
            })),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::offline_config;
    use crate::handlers::BuildArgs;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_status_before_and_after_build() {
        let dir = tempdir().unwrap();
        let handlers = CommandHandlers::new(offline_config(dir.path()));

        let before = handlers.handle_status(StatusArgs::default()).await.unwrap();
        assert_eq!(before["indexed"], false);

        handlers.handle_build(BuildArgs::default()).await.unwrap();
        let after = handlers.handle_status(StatusArgs::default()).await.unwrap();
        assert_eq!(after["indexed"], true);
        assert_eq!(after["documents"], 3);
    }
}

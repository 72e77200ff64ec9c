use super::{CommandHandlers, Output};
use crate::Result;
use tracing::info;

#[derive(Debug, Clone, Default, clap::Args)]
pub struct ClearArgs {}

impl CommandHandlers {
    /// Deletes the persisted keyword and semantic caches
    pub async fn handle_clear(&self, _args: ClearArgs) -> Result<Output> {
        let mut removed = Vec::new();
        for dir in [
            self.config.storage.keyword_cache_dir(),
            self.config.storage.semantic_cache_dir(),
        ] {
            if dir.exists() {
                tokio::fs::remove_dir_all(&dir).await?;
                info!("[CLEAR] Removed {}", dir.display());
                removed.push(dir);
            }
        }

        let message = if removed.is_empty() {
            "No cached indices to clear.".to_string()
        } else {
            format!("Cleared {} cache director{}", removed.len(), if removed.len() == 1 { "y" } else { "ies" })
        };

        Ok(serde_json::json!({
            "message": message,
            "removed": removed,
        }))
    }
}

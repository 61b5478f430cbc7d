//! Local fallback footage

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::warn;

/// Source of locally stored footage used when sourcing produced nothing
#[async_trait]
pub trait FallbackAssetStore: Send + Sync {
    /// Pick one asset uniformly at random, or `None` if there is nothing to pick
    async fn pick_random(&self, directory: &Path) -> Result<Option<PathBuf>>;
}

/// Picks a random regular file from a directory
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectoryFallback;

#[async_trait]
impl FallbackAssetStore for DirectoryFallback {
    async fn pick_random(&self, directory: &Path) -> Result<Option<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Fallback directory {} does not exist", directory.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to list {}", directory.display()))
            }
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        // read_dir order is platform dependent
        files.sort();

        Ok(files.choose(&mut rand::thread_rng()).cloned())
    }
}

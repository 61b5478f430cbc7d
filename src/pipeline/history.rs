//! Record of what has already been produced
//!
//! Headlines of finished videos are kept per kind so later scripts can avoid
//! repeats, and the last produced kind drives story/short alternation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::script::VideoKind;

/// Content history collaborator
#[async_trait]
pub trait ContentHistory: Send + Sync {
    /// Headlines recorded for `kind`, oldest first
    async fn entries(&self, kind: VideoKind) -> Result<Vec<String>>;

    async fn append(&self, kind: VideoKind, headline: &str) -> Result<()>;

    /// Kind of the most recent finished run, if known
    async fn last_kind(&self) -> Result<Option<VideoKind>>;

    async fn record_kind(&self, kind: VideoKind) -> Result<()>;
}

const LAST_KIND_FILE: &str = "last_video_type.txt";

/// History stored as JSON arrays plus a one-line last-kind file
#[derive(Debug, Clone)]
pub struct JsonContentHistory {
    dir: PathBuf,
}

impl JsonContentHistory {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entries_path(&self, kind: VideoKind) -> PathBuf {
        let name = match kind {
            VideoKind::Short => "chosen_facts.json",
            VideoKind::Long => "chosen_topics.json",
            VideoKind::Story => "chosen_stories.json",
        };
        self.dir.join(name)
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}

/// Entries from a history file; empty or non-array content reads as empty
fn parse_entries(content: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Ok(_) => Vec::new(),
        Err(e) => {
            if !content.trim().is_empty() {
                warn!("Ignoring unreadable history file: {e}");
            }
            Vec::new()
        }
    }
}

#[async_trait]
impl ContentHistory for JsonContentHistory {
    async fn entries(&self, kind: VideoKind) -> Result<Vec<String>> {
        let content = read_optional(&self.entries_path(kind)).await?;
        Ok(content.as_deref().map(parse_entries).unwrap_or_default())
    }

    async fn append(&self, kind: VideoKind, headline: &str) -> Result<()> {
        let mut entries = self.entries(kind).await?;
        entries.push(headline.to_string());

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.entries_path(kind);
        let json = serde_json::to_string_pretty(&entries)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        debug!("Recorded {kind} headline {headline:?}");
        Ok(())
    }

    async fn last_kind(&self) -> Result<Option<VideoKind>> {
        let content = read_optional(&self.dir.join(LAST_KIND_FILE)).await?;
        Ok(content.and_then(|c| c.trim().parse().ok()))
    }

    async fn record_kind(&self, kind: VideoKind) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(LAST_KIND_FILE);
        tokio::fs::write(&path, kind.as_str())
            .await
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

//! Streaming HTTP download of footage files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::FootageFetcher;

/// Downloads footage over HTTP, writing the body to disk chunk by chunk
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl FootageFetcher for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf> {
        // A stale file from an earlier run would otherwise be appended to
        match tokio::fs::remove_file(dest).await {
            Ok(()) => debug!("Removed stale {}", dest.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("failed to clear {}", dest.display()))
            }
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request for {url} failed"))?
            .error_for_status()
            .with_context(|| format!("download of {url} failed"))?;

        let mut file = File::create(dest)
            .await
            .with_context(|| format!("failed to create {}", dest.display()))?;

        let mut stream = response.bytes_stream();
        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.with_context(|| format!("download of {url} interrupted"))?;
            file.write_all(&chunk).await?;
            total_bytes += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Downloaded {} ({} bytes)", dest.display(), total_bytes);
        Ok(dest.to_path_buf())
    }
}
